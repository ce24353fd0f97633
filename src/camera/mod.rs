//! Isometric projection with four-way rotation.
//!
//! The camera looks at the world from one of four diagonal directions and
//! turns between them in a blended transition. Projection and depth
//! sorting each have two formulations: a direction-specific closed form
//! used while settled, and a trigonometric form in the blended view angle
//! used mid-turn. The two agree at the end of a turn, so the switch back
//! to the closed form never pops visually.

pub mod drawables;

use crate::world::chunk::CHUNK_HEIGHT;
use cgmath::{InnerSpace, Rad, Vector2, Vector3};

pub const PIXELS_PER_TILE: f32 = 24.0;
pub const PIXELS_PER_HALF_TILE: f32 = PIXELS_PER_TILE / 2.0;
pub const PIXELS_PER_QUARTER_TILE: f32 = PIXELS_PER_TILE / 4.0;

/// Duration of a turn blend, in seconds of tick time.
const TURN_SECONDS: f32 = 1.0;
/// The trig forms scale sin/cos by √2 so they coincide with the closed
/// forms at the diagonal angles.
const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Fold an angle in degrees into (-180, 180].
pub fn fold_angle(angle: f32) -> f32 {
    let mut folded = angle % 360.0;
    if folded > 180.0 {
        folded -= 360.0;
    } else if folded <= -180.0 {
        folded += 360.0;
    }
    folded
}

/// The four discrete view directions, named for the world diagonal the
/// camera looks along.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ViewDirection {
    NorthEast,
    NorthWest,
    SouthWest,
    SouthEast,
}

impl ViewDirection {
    /// Canonical view angle in degrees.
    pub fn angle(self) -> f32 {
        match self {
            ViewDirection::NorthEast => 45.0,
            ViewDirection::NorthWest => 135.0,
            ViewDirection::SouthWest => -135.0,
            ViewDirection::SouthEast => -45.0,
        }
    }

    /// Next direction around the compass. Clockwise turns move
    /// NE → SE → SW → NW; counter-clockwise the reverse.
    pub fn turned(self, clockwise: bool) -> Self {
        use ViewDirection::*;
        if clockwise {
            match self {
                NorthEast => SouthEast,
                SouthEast => SouthWest,
                SouthWest => NorthWest,
                NorthWest => NorthEast,
            }
        } else {
            match self {
                NorthEast => NorthWest,
                NorthWest => SouthWest,
                SouthWest => SouthEast,
                SouthEast => NorthEast,
            }
        }
    }
}

/// Rotation state: settled on a discrete direction, or blending through a
/// turn whose endpoint angles were fixed when the turn started.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CameraRotation {
    Settled,
    Turning {
        from_angle: f32,
        to_angle: f32,
        /// 1 at turn start, decays linearly to 0.
        blend: f32,
    },
}

pub struct IsometricProjector {
    direction: ViewDirection,
    rotation: CameraRotation,
}

impl Default for IsometricProjector {
    fn default() -> Self {
        Self::new(ViewDirection::NorthEast)
    }
}

impl IsometricProjector {
    pub fn new(direction: ViewDirection) -> Self {
        Self {
            direction,
            rotation: CameraRotation::Settled,
        }
    }

    pub fn direction(&self) -> ViewDirection {
        self.direction
    }

    pub fn rotation(&self) -> CameraRotation {
        self.rotation
    }

    pub fn is_turning(&self) -> bool {
        matches!(self.rotation, CameraRotation::Turning { .. })
    }

    /// Advance the discrete direction and start a new blend from the
    /// current displayed angle. Turning while already mid-turn re-anchors
    /// the blend at the angle the camera is showing right now.
    pub fn request_turn(&mut self, clockwise: bool) {
        let from_angle = self.view_angle();
        self.direction = self.direction.turned(clockwise);
        // Always ease along the shortest arc to the new canonical angle.
        let to_angle = from_angle + fold_angle(self.direction.angle() - from_angle);
        self.rotation = CameraRotation::Turning {
            from_angle,
            to_angle,
            blend: 1.0,
        };
    }

    /// Decay the blend with elapsed tick time; settles at blend 0.
    pub fn tick(&mut self, dt: f32) {
        if let CameraRotation::Turning {
            from_angle,
            to_angle,
            blend,
        } = self.rotation
        {
            let blend = blend - dt / TURN_SECONDS;
            self.rotation = if blend <= 0.0 {
                CameraRotation::Settled
            } else {
                CameraRotation::Turning {
                    from_angle,
                    to_angle,
                    blend,
                }
            };
        }
    }

    /// Displayed view angle in degrees, folded into (-180, 180].
    pub fn view_angle(&self) -> f32 {
        match self.rotation {
            CameraRotation::Settled => self.direction.angle(),
            CameraRotation::Turning {
                from_angle,
                to_angle,
                blend,
            } => {
                let progress = ease_out(1.0 - blend);
                fold_angle(from_angle + (to_angle - from_angle) * progress)
            }
        }
    }

    /// World position to screen position.
    pub fn project(&self, position: Vector3<f32>) -> Vector2<f32> {
        let (x, y, z) = (position.x, position.y, position.z);
        match self.rotation {
            CameraRotation::Settled => {
                let h = PIXELS_PER_HALF_TILE;
                let q = PIXELS_PER_QUARTER_TILE;
                match self.direction {
                    ViewDirection::NorthEast => {
                        Vector2::new(h * (x - z), q * (x + z) + h * y)
                    }
                    ViewDirection::NorthWest => {
                        Vector2::new(h * (x + z), q * -(x - z) + h * y)
                    }
                    ViewDirection::SouthWest => {
                        Vector2::new(h * -(x - z), q * -(x + z) + h * y)
                    }
                    ViewDirection::SouthEast => {
                        Vector2::new(h * -(x + z), q * (x - z) + h * y)
                    }
                }
            }
            CameraRotation::Turning { .. } => {
                let (sin, cos) = self.scaled_sin_cos();
                Vector2::new(
                    PIXELS_PER_HALF_TILE * (cos * -z + sin * x),
                    PIXELS_PER_QUARTER_TILE * (sin * z + cos * x) + PIXELS_PER_HALF_TILE * y,
                )
            }
        }
    }

    /// Depth key for painter's-order sorting; larger draws later.
    pub fn sort_key(&self, position: Vector3<f32>) -> f32 {
        let (x, y, z) = (position.x, position.y, position.z);
        match self.rotation {
            CameraRotation::Settled => match self.direction {
                ViewDirection::NorthEast => y - (x + z),
                ViewDirection::NorthWest => y + (x - z),
                ViewDirection::SouthWest => y + (x + z),
                ViewDirection::SouthEast => y - (x - z),
            },
            CameraRotation::Turning { .. } => {
                let (sin, cos) = self.scaled_sin_cos();
                y - (cos * x + sin * z)
            }
        }
    }

    /// Orientation tests for dependent sprite logic, derived from the
    /// signed shortest angular difference folded into (-180, 180]:
    /// "other is counter-clockwise of mine", and "other is within 90°".
    pub fn flip_tests(&self, other_angle: f32) -> (bool, bool) {
        let diff = fold_angle(other_angle - self.view_angle());
        (diff < 0.0, diff.abs() < 90.0)
    }

    /// Picking ray for a screen position: origin at the top of the world,
    /// direction along the view diagonal. Every point of the ray projects
    /// back onto the given screen position.
    pub fn ray_at_screen_position(&self, screen: Vector2<f32>) -> (Vector3<f32>, Vector3<f32>) {
        let height = CHUNK_HEIGHT as f32;
        let spin = self.view_angle() - 45.0;
        let origin = rotate_horizontal(
            Vector3::new(
                (screen.x + screen.y * 2.0) / PIXELS_PER_TILE - height,
                height,
                (screen.y * 2.0 - screen.x) / PIXELS_PER_TILE - height,
            ),
            spin,
        );
        let direction = rotate_horizontal(Vector3::new(1.0, -1.0, 1.0), spin);
        (origin, direction)
    }

    /// Map a screen-space input direction (e.g. movement keys) onto the
    /// horizontal world plane for the current view angle.
    pub fn screen_to_world_direction(&self, direction: Vector2<f32>) -> Vector2<f32> {
        if direction == Vector2::new(0.0, 0.0) {
            return direction;
        }
        let normalized = direction.normalize();
        let radians = (self.view_angle() - 90.0).to_radians();
        let (sin, cos) = radians.sin_cos();
        Vector2::new(
            normalized.x * cos - normalized.y * sin,
            normalized.x * sin + normalized.y * cos,
        )
    }

    fn scaled_sin_cos(&self) -> (f32, f32) {
        let radians = Rad::from(cgmath::Deg(self.view_angle())).0;
        (radians.sin() * SQRT_2, radians.cos() * SQRT_2)
    }
}

/// Cubic ease-out over [0, 1].
#[inline]
fn ease_out(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

/// Rotate a vector around the vertical axis by `degrees`.
fn rotate_horizontal(v: Vector3<f32>, degrees: f32) -> Vector3<f32> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vector3::new(v.x * cos - v.z * sin, v.y, v.x * sin + v.z * cos)
}
