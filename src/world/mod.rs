//! The sandbox world: chunk storage, streaming, generation, and tile
//! queries behind one facade.
//!
//! The tick is single-threaded; only generation runs on worker threads.
//! Each tick polls the viewer position once and uses that snapshot for
//! every distance decision, so the request and evict passes can never
//! disagree about where the viewer is.

pub mod chunk;
pub mod generator;
pub mod index;
pub mod raycast;
pub mod streaming;

use crate::block::{BlockId, BlockRegistry};
use cgmath::{vec2, Vector3};
use chunk::{Chunk, ChunkCoord, ChunkState, TilePos};
use generator::{ChunkGenerator, TerrainParams};
use index::SpatialIndex;
use raycast::{RayHit, SolidQuery};
use std::sync::Arc;
use streaming::{ChunkPopulator, ChunkStreamingManager, StreamingConfig};

/// Anything the world follows to decide chunk residency.
pub trait ViewerTracker {
    fn viewer_position(&self) -> Vector3<f32>;
}

pub struct WorldConfig {
    pub seed: u32,
    pub load_radius: f32,
    pub unload_radius: f32,
    pub worker_count: usize,
    pub max_retries: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let streaming = StreamingConfig::default();
        Self {
            seed: 0,
            load_radius: streaming.load_radius,
            unload_radius: streaming.unload_radius,
            worker_count: 2,
            max_retries: streaming.max_retries,
        }
    }
}

pub struct World {
    registry: Arc<BlockRegistry>,
    index: SpatialIndex,
    generator: ChunkGenerator,
    streaming: ChunkStreamingManager,
    populator: Option<ChunkPopulator>,
    world_time: f64,
}

impl World {
    pub fn new(config: WorldConfig, registry: Arc<BlockRegistry>) -> Self {
        let params = Arc::new(TerrainParams::new(config.seed, &registry));
        let generator = ChunkGenerator::from_params(params, config.worker_count);
        let streaming = ChunkStreamingManager::new(
            StreamingConfig {
                load_radius: config.load_radius,
                unload_radius: config.unload_radius,
                max_retries: config.max_retries,
            },
            registry.air(),
        );
        let mut world = Self {
            registry,
            index: SpatialIndex::new(),
            generator,
            streaming,
            populator: None,
            world_time: 0.0,
        };
        // The origin chunk is requested up front so the world has ground
        // under the spawn point before the first tick completes.
        world
            .streaming
            .request_load(&mut world.index, &world.generator, ChunkCoord::new(0, 0));
        world
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn world_time(&self) -> f64 {
        self.world_time
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.index
            .iter()
            .filter(|c| c.state() == ChunkState::Loaded)
            .count()
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.index.get(coord)
    }

    /// Install the one-time decoration hook run after a chunk's first
    /// generation.
    pub fn set_populator(&mut self, populator: ChunkPopulator) {
        self.populator = Some(populator);
    }

    /// Advance the simulation. The viewer is polled exactly once; the same
    /// snapshot drives the request pass, the evict pass, and nothing else
    /// reads the tracker this tick.
    pub fn tick(&mut self, dt: f64, viewer: &impl ViewerTracker) {
        self.world_time += dt;
        let position = viewer.viewer_position();
        let horizontal = vec2(position.x, position.z);

        self.streaming
            .request_pass(&mut self.index, &self.generator, horizontal);
        self.streaming.evict_pass(&mut self.index, horizontal);
        self.streaming
            .drain_completions(&mut self.index, &self.generator, &mut self.populator);
    }

    /// Tile at a world position, or None when the position is outside
    /// vertical bounds or its chunk is not Loaded. Loading placeholders and
    /// Unloaded chunks are invisible to queries.
    pub fn tile_at(&self, tile: TilePos) -> Option<&chunk::Tile> {
        if !tile.in_vertical_bounds() {
            return None;
        }
        let chunk = self.index.get(ChunkCoord::from_tile(tile))?;
        if chunk.state() != ChunkState::Loaded {
            return None;
        }
        let (lx, y, lz) = tile.local();
        Some(chunk.tile(lx, y, lz))
    }

    pub fn is_solid(&self, tile: TilePos) -> bool {
        self.tile_at(tile)
            .map(|t| self.registry.is_solid(t.block()))
            .unwrap_or(false)
    }

    /// First solid tile along a ray, honoring loaded-chunk visibility.
    pub fn ray_trace(&self, start: Vector3<f32>, direction: Vector3<f32>) -> Option<RayHit> {
        raycast::ray_trace(start, direction, self)
    }

    /// Y of the first air tile above the terrain at a world column, or 0
    /// when the chunk is not resident.
    pub fn surface_height(&self, wx: i32, wz: i32) -> i32 {
        let coord = ChunkCoord::from_tile(TilePos::new(wx, 0, wz));
        let Some(chunk) = self.index.get(coord) else {
            return 0;
        };
        let lx = wx.rem_euclid(chunk::CHUNK_SIZE);
        let lz = wz.rem_euclid(chunk::CHUNK_SIZE);
        chunk.surface_height(lx, lz, |id| self.registry.is_solid(id))
    }

    /// Overwrite the tile at a position. Fails quietly (returning false)
    /// when the position is out of bounds or its chunk is not Loaded.
    pub fn place_block(&mut self, tile: TilePos, block: BlockId) -> bool {
        if !tile.in_vertical_bounds() {
            return false;
        }
        let Some(chunk) = self.index.get_mut(ChunkCoord::from_tile(tile)) else {
            return false;
        };
        if chunk.state() != ChunkState::Loaded {
            return false;
        }
        let (lx, y, lz) = tile.local();
        chunk.tile_mut(lx, y, lz).set_block(block);
        true
    }

    /// Replace the tile at a position with air.
    pub fn destroy_block(&mut self, tile: TilePos) -> bool {
        let air = self.registry.air();
        self.place_block(tile, air)
    }
}

impl SolidQuery for World {
    fn is_solid_at(&self, tile: TilePos) -> bool {
        self.is_solid(tile)
    }
}
