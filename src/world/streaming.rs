//! Chunk residency around the viewer.
//!
//! Keeps every chunk within `load_radius` of the viewer resident and
//! releases chunks beyond `unload_radius`. The gap between the radii is a
//! hysteresis band: a chunk sitting near the load boundary does not thrash
//! between states as the viewer jitters.

use super::chunk::{Chunk, ChunkCoord, ChunkState, Tile, CHUNK_SIZE, NEIGHBOR_OFFSETS};
use super::generator::{ChunkGenerator, GenerationRequest};
use super::index::{pack_coord, SpatialIndex};
use crate::block::BlockId;
use cgmath::Vector2;
use std::collections::{HashMap, HashSet};

/// Runs once per chunk right after its first generation, for biome
/// decoration and entity seeding. Never re-run on reload.
pub type ChunkPopulator = Box<dyn FnMut(ChunkCoord, &mut Chunk)>;

pub struct StreamingConfig {
    pub load_radius: f32,
    pub unload_radius: f32,
    pub max_retries: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 30.0,
            unload_radius: 50.0,
            max_retries: 3,
        }
    }
}

pub struct ChunkStreamingManager {
    config: StreamingConfig,
    air: BlockId,
    retries: HashMap<u64, u32>,
    failed: HashSet<u64>,
}

impl ChunkStreamingManager {
    pub fn new(config: StreamingConfig, air: BlockId) -> Self {
        debug_assert!(config.unload_radius > config.load_radius);
        Self {
            config,
            air,
            retries: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Coordinates permanently failed after exhausting retries.
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Request every chunk whose center lies within `load_radius` of the
    /// viewer's horizontal position. Squared-distance tests only.
    pub fn request_pass(
        &mut self,
        index: &mut SpatialIndex,
        generator: &ChunkGenerator,
        viewer: Vector2<f32>,
    ) {
        let radius = self.config.load_radius;
        let size = CHUNK_SIZE as f32;
        let x_min = ((viewer.x - radius) / size).floor() as i32;
        let x_max = ((viewer.x + radius) / size).floor() as i32;
        let z_min = ((viewer.y - radius) / size).floor() as i32;
        let z_max = ((viewer.y + radius) / size).floor() as i32;

        for x in x_min..=x_max {
            for z in z_min..=z_max {
                let coord = ChunkCoord::new(x, z);
                let (cx, cz) = coord.center();
                let dx = cx - viewer.x;
                let dz = cz - viewer.y;
                if dx * dx + dz * dz < radius * radius {
                    self.request_load(index, generator, coord);
                }
            }
        }
    }

    /// Ensure one coordinate is resident: absent coordinates get a Loading
    /// placeholder plus a generation request; present-but-Unloaded chunks
    /// flip back to Loaded without regenerating. Index presence (not chunk
    /// state) is what bounds outstanding requests to one per coordinate.
    pub fn request_load(
        &mut self,
        index: &mut SpatialIndex,
        generator: &ChunkGenerator,
        coord: ChunkCoord,
    ) {
        match index.get_mut(coord) {
            None => {
                if index.insert(coord, Chunk::placeholder(coord, self.air)).is_ok() {
                    generator.submit(GenerationRequest { coord, attempt: 0 });
                }
            }
            Some(chunk) => {
                if chunk.state() == ChunkState::Unloaded {
                    chunk.load();
                }
            }
        }
    }

    /// Unload every Loaded chunk whose center is beyond `unload_radius`.
    /// Content is preserved; nothing leaves the index.
    pub fn evict_pass(&mut self, index: &mut SpatialIndex, viewer: Vector2<f32>) {
        let radius = self.config.unload_radius;
        for chunk in index.iter_mut() {
            if chunk.state() != ChunkState::Loaded {
                continue;
            }
            let (cx, cz) = chunk.coord().center();
            let dx = cx - viewer.x;
            let dz = cz - viewer.y;
            if dx * dx + dz * dz > radius * radius {
                chunk.unload();
            }
        }
    }

    /// Drain the completion queue: promote generated content, link the
    /// eight neighbor slots bidirectionally with resident chunks, and run
    /// one-time population. Failures are resubmitted up to the retry
    /// bound, then marked permanently failed. Returns how many chunks were
    /// promoted.
    pub fn drain_completions(
        &mut self,
        index: &mut SpatialIndex,
        generator: &ChunkGenerator,
        populator: &mut Option<ChunkPopulator>,
    ) -> usize {
        let mut promoted = 0;
        // One pop per iteration; the result is processed with the queue
        // lock released.
        while let Some(result) = generator.drain_one() {
            let coord = result.coord;
            match result.outcome {
                Ok(tiles) => {
                    self.retries.remove(&pack_coord(coord));
                    if self.promote(index, coord, tiles, populator) {
                        promoted += 1;
                    }
                }
                Err(error) => {
                    let attempt = result.attempt + 1;
                    if attempt <= self.config.max_retries {
                        log::warn!("{error}; retrying (attempt {attempt})");
                        self.retries.insert(pack_coord(coord), attempt);
                        generator.submit(GenerationRequest { coord, attempt });
                    } else {
                        // The placeholder stays Loading: a stale-but-valid
                        // chunk is preferable to a half-built one.
                        self.failed.insert(pack_coord(coord));
                        log::error!("{error}; giving up after {} retries", self.config.max_retries);
                    }
                }
            }
        }
        promoted
    }

    fn promote(
        &mut self,
        index: &mut SpatialIndex,
        coord: ChunkCoord,
        tiles: Box<[Tile]>,
        populator: &mut Option<ChunkPopulator>,
    ) -> bool {
        if index.get(coord).is_none() {
            // The placeholder is created before submission, so this only
            // happens if a caller bypassed request_load.
            log::error!("generated chunk ({}, {}) has no placeholder", coord.x, coord.z);
            return false;
        }

        let resident_neighbors: Vec<(usize, ChunkCoord)> = NEIGHBOR_OFFSETS
            .iter()
            .enumerate()
            .filter_map(|(slot, &(dx, dz))| {
                let neighbor = coord.offset(dx, dz);
                index.get(neighbor).map(|_| (slot, neighbor))
            })
            .collect();

        {
            let chunk = index.get_mut(coord).expect("placeholder checked above");
            chunk.adopt_tiles(tiles);
            for &(slot, neighbor) in &resident_neighbors {
                chunk.set_neighbor(slot, neighbor);
            }
        }
        for &(slot, neighbor) in &resident_neighbors {
            if let Some(neighbor_chunk) = index.get_mut(neighbor) {
                neighbor_chunk.set_neighbor(super::chunk::reciprocal_slot(slot), coord);
            }
        }

        let chunk = index.get_mut(coord).expect("placeholder checked above");
        if !chunk.is_populated() {
            chunk.mark_populated();
            if let Some(populate) = populator.as_mut() {
                populate(coord, chunk);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockRegistry;
    use crate::world::chunk::reciprocal_slot;
    use crate::world::generator::{generate_tiles, GenerateFn, TerrainParams};
    use cgmath::vec2;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct Fixture {
        index: SpatialIndex,
        manager: ChunkStreamingManager,
        generator: ChunkGenerator,
        generated: Arc<AtomicU32>,
    }

    fn fixture(config: StreamingConfig) -> Fixture {
        let registry = BlockRegistry::from_embedded();
        let params = Arc::new(TerrainParams::new(77, &registry));
        let generated = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&generated);
        let generate: GenerateFn = Arc::new(move |coord| {
            counter.fetch_add(1, Ordering::SeqCst);
            generate_tiles(&params, coord)
        });
        Fixture {
            index: SpatialIndex::new(),
            manager: ChunkStreamingManager::new(config, registry.air()),
            generator: ChunkGenerator::new(generate, 1),
            generated,
        }
    }

    fn drain_until_loaded(fixture: &mut Fixture, coord: ChunkCoord) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut populator = None;
        loop {
            fixture
                .manager
                .drain_completions(&mut fixture.index, &fixture.generator, &mut populator);
            if fixture.index.get(coord).map(|c| c.state()) == Some(ChunkState::Loaded) {
                return;
            }
            assert!(Instant::now() < deadline, "chunk never loaded");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn reload_does_not_regenerate() {
        let mut fx = fixture(StreamingConfig::default());
        let coord = ChunkCoord::new(0, 0);
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        drain_until_loaded(&mut fx, coord);
        assert_eq!(fx.generated.load(Ordering::SeqCst), 1);
        let before: Vec<_> = fx.index.get(coord).unwrap().tiles().to_vec();

        fx.index.get_mut(coord).unwrap().unload();
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        assert_eq!(fx.index.get(coord).unwrap().state(), ChunkState::Loaded);

        // Requesting an already-Loaded chunk is also a no-op.
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        std::thread::sleep(Duration::from_millis(20));
        let mut populator = None;
        fx.manager
            .drain_completions(&mut fx.index, &fx.generator, &mut populator);
        assert_eq!(fx.generated.load(Ordering::SeqCst), 1, "no regeneration");
        assert_eq!(fx.index.get(coord).unwrap().tiles(), &before[..]);
    }

    #[test]
    fn hysteresis_band_neither_loads_nor_evicts() {
        // load 30 / unload 50; a chunk whose center sits at distance ~40.
        let mut fx = fixture(StreamingConfig::default());
        let viewer = vec2(0.0f32, 0.0);
        let coord = ChunkCoord::new(2, 0); // center (40, 8), distance ~40.8
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        drain_until_loaded(&mut fx, coord);

        // Beyond load_radius: the pass must not have created it a second
        // time, and eviction must leave it Loaded.
        fx.manager.request_pass(&mut fx.index, &fx.generator, viewer);
        fx.manager.evict_pass(&mut fx.index, viewer);
        assert_eq!(fx.index.get(coord).unwrap().state(), ChunkState::Loaded);

        // An absent chunk at the same distance is not created by the pass.
        assert!(!fx.index.contains(ChunkCoord::new(-3, 0)));
        fx.manager.request_pass(&mut fx.index, &fx.generator, viewer);
        assert!(!fx.index.contains(ChunkCoord::new(-3, 0)));
    }

    #[test]
    fn request_pass_loads_the_viewer_neighborhood() {
        let mut fx = fixture(StreamingConfig::default());
        let viewer = vec2(8.0f32, 8.0);
        fx.manager.request_pass(&mut fx.index, &fx.generator, viewer);
        assert!(fx.index.contains(ChunkCoord::new(0, 0)));
        assert!(fx.index.contains(ChunkCoord::new(-1, 0)));
        assert!(fx.index.contains(ChunkCoord::new(1, 1)));
        // Everything requested is within the load radius.
        for chunk in fx.index.iter() {
            let (cx, cz) = chunk.coord().center();
            let (dx, dz) = (cx - viewer.x, cz - viewer.y);
            assert!(dx * dx + dz * dz < 30.0 * 30.0);
        }
    }

    #[test]
    fn eviction_preserves_content() {
        let mut fx = fixture(StreamingConfig::default());
        let coord = ChunkCoord::new(0, 0);
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        drain_until_loaded(&mut fx, coord);
        let before: Vec<_> = fx.index.get(coord).unwrap().tiles().to_vec();

        // Viewer far away: chunk center distance >> 50.
        fx.manager.evict_pass(&mut fx.index, vec2(1000.0, 0.0));
        let chunk = fx.index.get(coord).unwrap();
        assert_eq!(chunk.state(), ChunkState::Unloaded);
        assert_eq!(chunk.tiles(), &before[..]);
    }

    #[test]
    fn neighbors_link_reciprocally_on_promotion() {
        let mut fx = fixture(StreamingConfig::default());
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, 0);
        fx.manager.request_load(&mut fx.index, &fx.generator, a);
        fx.manager.request_load(&mut fx.index, &fx.generator, b);
        drain_until_loaded(&mut fx, a);
        drain_until_loaded(&mut fx, b);

        let slot_b = NEIGHBOR_OFFSETS.iter().position(|&o| o == (1, 0)).unwrap();
        assert_eq!(fx.index.get(a).unwrap().neighbor(slot_b), Some(b));
        assert_eq!(
            fx.index.get(b).unwrap().neighbor(reciprocal_slot(slot_b)),
            Some(a)
        );
    }

    #[test]
    fn population_runs_exactly_once() {
        let mut fx = fixture(StreamingConfig::default());
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let mut populator: Option<ChunkPopulator> =
            Some(Box::new(move |_coord, _chunk: &mut Chunk| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        let coord = ChunkCoord::new(0, 0);
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        let deadline = Instant::now() + Duration::from_secs(5);
        while fx.index.get(coord).unwrap().state() != ChunkState::Loaded {
            fx.manager
                .drain_completions(&mut fx.index, &fx.generator, &mut populator);
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Unload/reload must not re-populate.
        fx.index.get_mut(coord).unwrap().unload();
        fx.manager.request_load(&mut fx.index, &fx.generator, coord);
        fx.manager
            .drain_completions(&mut fx.index, &fx.generator, &mut populator);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_generation_retries_then_surfaces_an_anomaly() {
        let registry = BlockRegistry::from_embedded();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let generate: GenerateFn = Arc::new(move |_coord| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("flaky worker");
        });
        let generator = ChunkGenerator::new(generate, 1);
        let mut index = SpatialIndex::new();
        let mut manager = ChunkStreamingManager::new(
            StreamingConfig {
                max_retries: 2,
                ..StreamingConfig::default()
            },
            registry.air(),
        );

        let coord = ChunkCoord::new(5, 5);
        manager.request_load(&mut index, &generator, coord);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut populator = None;
        while manager.failed_count() == 0 {
            manager.drain_completions(&mut index, &generator, &mut populator);
            assert!(Instant::now() < deadline, "failure never surfaced");
            std::thread::sleep(Duration::from_millis(1));
        }

        // Initial attempt + max_retries resubmissions, then permanent.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(manager.failed_count(), 1);
        // Stale-but-valid preference: the placeholder is still Loading,
        // never half-promoted.
        assert_eq!(index.get(coord).unwrap().state(), ChunkState::Loading);
    }
}
