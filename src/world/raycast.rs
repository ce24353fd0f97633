//! Voxel-grid line traversal.
//!
//! Steps a ray from integer boundary to integer boundary, testing each
//! entered voxel for solidity through the spatial query surface. There is
//! no built-in maximum distance: the trace ends when it hits a solid voxel
//! or leaves the vertical world bounds, and bounding anything else is the
//! caller's responsibility.

use super::chunk::{TilePos, CHUNK_HEIGHT};
use cgmath::{InnerSpace, Vector3};

/// Answers voxel solidity for the raycaster. Positions outside loaded
/// chunks or vertical bounds are simply not solid.
pub trait SolidQuery {
    fn is_solid_at(&self, tile: TilePos) -> bool;
}

/// First solid voxel along a ray.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Point on the entered voxel's face where the ray crossed.
    pub point: Vector3<f32>,
    /// Unit normal of the crossed face, opposing the ray direction.
    pub normal: Vector3<f32>,
    /// The solid voxel that was entered.
    pub tile: TilePos,
}

#[inline]
fn axis(v: Vector3<f32>, i: usize) -> f32 {
    match i {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

#[inline]
fn unit_axis(i: usize, sign: f32) -> Vector3<f32> {
    let mut n = Vector3::new(0.0, 0.0, 0.0);
    match i {
        0 => n.x = sign,
        1 => n.y = sign,
        _ => n.z = sign,
    }
    n
}

/// Trace from `start` along `direction` to the first solid voxel.
///
/// Per step: for each axis with nonzero direction, the parametric advance
/// to the next integer boundary is computed; the globally nearest crossing
/// wins (ties to the lowest axis index) and fixes the face normal. The
/// occupied voxel is then recomputed per axis — floor for a positive
/// component, ceil-minus-one for a negative one — so a position sitting
/// exactly on a boundary resolves to the voxel the ray is entering.
pub fn ray_trace(
    start: Vector3<f32>,
    direction: Vector3<f32>,
    query: &impl SolidQuery,
) -> Option<RayHit> {
    if direction == Vector3::new(0.0, 0.0, 0.0) {
        return None;
    }

    let mut position = start;

    loop {
        let mut best_delta: Option<Vector3<f32>> = None;
        let mut face_normal = Vector3::new(0.0, 0.0, 0.0);

        for i in 0..3 {
            let d = axis(direction, i);
            if d == 0.0 {
                continue;
            }
            let p = axis(position, i);
            let next_boundary = if d > 0.0 {
                p.floor() + 1.0
            } else {
                p.ceil() - 1.0
            };
            let delta = direction * ((next_boundary - p) / d);
            let closer = match best_delta {
                None => true,
                Some(best) => delta.magnitude2() < best.magnitude2(),
            };
            if closer {
                best_delta = Some(delta);
                face_normal = unit_axis(i, if d < 0.0 { 1.0 } else { -1.0 });
            }
        }

        position += best_delta?;

        // Leaving the vertical world bounds is a normal miss.
        if position.y < 0.0 || position.y > CHUNK_HEIGHT as f32 {
            return None;
        }

        let tile = TilePos::new(
            entered_cell(position.x, direction.x),
            entered_cell(position.y, direction.y),
            entered_cell(position.z, direction.z),
        );

        if query.is_solid_at(tile) {
            return Some(RayHit {
                point: position,
                normal: face_normal,
                tile,
            });
        }
    }
}

#[inline]
fn entered_cell(p: f32, d: f32) -> i32 {
    if d > 0.0 {
        p.floor() as i32
    } else {
        p.ceil() as i32 - 1
    }
}
