//! Chunk storage: a fixed 16×32×16 voxel grid with lifecycle state and
//! non-owning links to its eight horizontal neighbors.

use crate::block::BlockId;
use cgmath::Vector3;

pub const CHUNK_SIZE: i32 = 16;
pub const CHUNK_HEIGHT: i32 = 32;
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE) as usize;

/// The eight horizontal neighbor offsets, ordered as a ring so that the
/// reciprocal of slot `i` is slot `(i + 4) % 8`.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
];

/// Slot index holding the neighbor on the opposite side of `slot`.
#[inline]
pub fn reciprocal_slot(slot: usize) -> usize {
    (slot + 4) % 8
}

/// Integer chunk coordinate on the horizontal plane. Immutable once
/// assigned to a chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given tile position.
    pub fn from_tile(tile: TilePos) -> Self {
        Self {
            x: tile.x.div_euclid(CHUNK_SIZE),
            z: tile.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Chunk containing the given world-space position.
    pub fn from_world(position: Vector3<f32>) -> Self {
        Self {
            x: (position.x / CHUNK_SIZE as f32).floor() as i32,
            z: (position.z / CHUNK_SIZE as f32).floor() as i32,
        }
    }

    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// World-space center of this chunk's footprint, used for streaming
    /// distance tests.
    pub fn center(self) -> (f32, f32) {
        (
            (self.x as f32 + 0.5) * CHUNK_SIZE as f32,
            (self.z as f32 + 0.5) * CHUNK_SIZE as f32,
        )
    }
}

/// Integer tile (voxel) position in world space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Local coordinates within the owning chunk.
    pub fn local(self) -> (i32, i32, i32) {
        (
            self.x.rem_euclid(CHUNK_SIZE),
            self.y,
            self.z.rem_euclid(CHUNK_SIZE),
        )
    }

    pub fn in_vertical_bounds(self) -> bool {
        self.y >= 0 && self.y < CHUNK_HEIGHT
    }
}

/// One voxel cell. Identity is chunk + local coordinate; tiles are mutated
/// in place and never have an independent lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    block: BlockId,
}

impl Tile {
    pub fn new(block: BlockId) -> Self {
        Self { block }
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn set_block(&mut self, block: BlockId) {
        self.block = block;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Unloaded,
    Loading,
    Loaded,
}

/// A resident chunk. Content is retained for the whole session: unloading
/// flips the state but never frees the tiles, so a reload restores the
/// exact pre-unload content without regeneration.
pub struct Chunk {
    coord: ChunkCoord,
    state: ChunkState,
    tiles: Box<[Tile]>,
    neighbors: [Option<ChunkCoord>; 8],
    populated: bool,
}

impl Chunk {
    /// Placeholder inserted while generation is in flight: all air, state
    /// Loading, invisible to tile queries until promoted.
    pub fn placeholder(coord: ChunkCoord, air: BlockId) -> Self {
        Self {
            coord,
            state: ChunkState::Loading,
            tiles: vec![Tile::new(air); CHUNK_VOLUME].into_boxed_slice(),
            neighbors: [None; 8],
            populated: false,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    #[inline]
    fn index(lx: i32, y: i32, lz: i32) -> usize {
        debug_assert!((0..CHUNK_SIZE).contains(&lx));
        debug_assert!((0..CHUNK_HEIGHT).contains(&y));
        debug_assert!((0..CHUNK_SIZE).contains(&lz));
        (y * CHUNK_SIZE * CHUNK_SIZE + lz * CHUNK_SIZE + lx) as usize
    }

    pub fn tile(&self, lx: i32, y: i32, lz: i32) -> &Tile {
        &self.tiles[Self::index(lx, y, lz)]
    }

    pub fn tile_mut(&mut self, lx: i32, y: i32, lz: i32) -> &mut Tile {
        &mut self.tiles[Self::index(lx, y, lz)]
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Promote a freshly generated tile buffer into this placeholder.
    pub fn adopt_tiles(&mut self, tiles: Box<[Tile]>) {
        debug_assert_eq!(tiles.len(), CHUNK_VOLUME);
        self.tiles = tiles;
        self.state = ChunkState::Loaded;
    }

    /// Transition back to Loaded; the retained content is reused as-is.
    pub fn load(&mut self) {
        if self.state == ChunkState::Unloaded {
            self.state = ChunkState::Loaded;
        }
    }

    /// Transition to Unloaded, content preserved.
    pub fn unload(&mut self) {
        if self.state == ChunkState::Loaded {
            self.state = ChunkState::Unloaded;
        }
    }

    pub fn neighbor(&self, slot: usize) -> Option<ChunkCoord> {
        self.neighbors[slot]
    }

    pub fn set_neighbor(&mut self, slot: usize, coord: ChunkCoord) {
        self.neighbors[slot] = Some(coord);
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn mark_populated(&mut self) {
        self.populated = true;
    }

    /// Y of the first air tile above the highest solid tile in the local
    /// column, i.e. where something standing on the surface rests.
    pub fn surface_height(&self, lx: i32, lz: i32, solid: impl Fn(BlockId) -> bool) -> i32 {
        for y in (0..CHUNK_HEIGHT).rev() {
            if solid(self.tile(lx, y, lz).block()) {
                return y + 1;
            }
        }
        0
    }
}
