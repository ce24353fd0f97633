//! O(1) spatial index from chunk coordinate to chunk.
//!
//! Keys are packed with zig-zag encoding per axis before combining, so the
//! packing is injective over the whole signed coordinate range. (A naive
//! `x << 16 | z` collides for mixed-sign coordinates.)

use super::chunk::{Chunk, ChunkCoord};
use std::collections::HashMap;
use std::fmt;

#[inline]
fn zigzag(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Injective packing of a signed 2D chunk coordinate into one key.
#[inline]
pub fn pack_coord(coord: ChunkCoord) -> u64 {
    ((zigzag(coord.x) as u64) << 32) | zigzag(coord.z) as u64
}

/// Attempt to re-insert an already-indexed coordinate. A programming
/// error: chunks are created exactly once per coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuplicateKey(pub ChunkCoord);

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk ({}, {}) is already indexed", self.0.x, self.0.z)
    }
}

impl std::error::Error for DuplicateKey {}

#[derive(Default)]
pub struct SpatialIndex {
    chunks: HashMap<u64, Chunk>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
        }
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&pack_coord(coord))
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pack_coord(coord))
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&pack_coord(coord))
    }

    /// Insert a chunk under its coordinate. Duplicate insertion asserts in
    /// debug builds and is a logged no-op in release: the indexed chunk is
    /// never replaced.
    pub fn insert(&mut self, coord: ChunkCoord, chunk: Chunk) -> Result<(), DuplicateKey> {
        let key = pack_coord(coord);
        if self.chunks.contains_key(&key) {
            let error = DuplicateKey(coord);
            debug_assert!(false, "{error}");
            log::error!("{error}");
            return Err(error);
        }
        self.chunks.insert(key, chunk);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use std::collections::HashSet;

    #[test]
    fn packing_is_injective_over_mixed_signs() {
        let mut seen = HashSet::new();
        for x in -40..=40 {
            for z in -40..=40 {
                assert!(
                    seen.insert(pack_coord(ChunkCoord::new(x, z))),
                    "collision at ({x}, {z})"
                );
            }
        }
        // The original shift-and-add scheme collides on exactly this kind
        // of pair; the packed keys must differ.
        assert_ne!(
            pack_coord(ChunkCoord::new(1, -65536)),
            pack_coord(ChunkCoord::new(0, 0))
        );
        assert_ne!(
            pack_coord(ChunkCoord::new(i32::MIN, i32::MAX)),
            pack_coord(ChunkCoord::new(i32::MAX, i32::MIN))
        );
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "already indexed"))]
    fn duplicate_insert_is_rejected() {
        let air = BlockId(0);
        let coord = ChunkCoord::new(2, -3);
        let mut index = SpatialIndex::new();
        index.insert(coord, Chunk::placeholder(coord, air)).unwrap();
        // Debug builds assert; release builds return the error and keep
        // the original chunk.
        let result = index.insert(coord, Chunk::placeholder(coord, air));
        assert_eq!(result, Err(DuplicateKey(coord)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn get_round_trips() {
        let air = BlockId(0);
        let mut index = SpatialIndex::new();
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-7, 12)] {
            index.insert(coord, Chunk::placeholder(coord, air)).unwrap();
        }
        assert_eq!(index.len(), 2);
        assert!(index.contains(ChunkCoord::new(-7, 12)));
        assert!(!index.contains(ChunkCoord::new(12, -7)));
        assert_eq!(
            index.get(ChunkCoord::new(-7, 12)).map(|c| c.coord()),
            Some(ChunkCoord::new(-7, 12))
        );
    }
}
