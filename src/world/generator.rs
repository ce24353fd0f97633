//! Procedural chunk generation.
//!
//! Terrain synthesis is a pure function of `(coordinate, seed)`: per-column
//! height from continuous 2D noise sampled in world space (so columns line
//! up across chunk boundaries), bedrock at the floor layer, a depth-weighted
//! filler below the height threshold, air above. The weighting uses salted
//! integer hashing rather than an RNG so regeneration and parallel execution
//! reproduce identical content.
//!
//! Generation runs on a small pool of worker threads fed through an mpsc
//! channel. Completions flow back through a shared queue: workers push
//! without blocking the tick, and the tick pops one entry under the lock,
//! then processes it outside the lock.

use crate::block::{BlockId, BlockRegistry};
use crate::world::chunk::{ChunkCoord, Tile, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME};
use noise::{NoiseFn, Perlin};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

const HEIGHT_NOISE_OFFSET: f64 = 1024.0;
const HEIGHT_NOISE_FREQUENCY: f64 = 0.1;
const HEIGHT_NOISE_AMPLITUDE: f64 = 12.0;
const HEIGHT_BASE: i32 = 2;
const STONE_DEPTH_FLOOR: i32 = 4;
const STONE_DEPTH_JITTER: u64 = 5;
const FILLER_HASH_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Deterministic per-tile hash for weighted filler selection.
#[inline]
fn salted_hash(seed: u32, x: i32, y: i32, z: i32) -> u64 {
    let mut h = FILLER_HASH_SALT ^ (seed as u64);
    for v in [x as u32 as u64, y as u32 as u64, z as u32 as u64] {
        h ^= v.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h = h.rotate_left(31).wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    }
    h ^= h >> 33;
    h
}

/// Everything a worker needs to synthesize a chunk. Immutable and shared
/// across the pool.
pub struct TerrainParams {
    seed: u32,
    height_noise: Perlin,
    air: BlockId,
    bedrock: BlockId,
    grass: BlockId,
    stone: BlockId,
}

impl TerrainParams {
    /// Resolve the terrain block set against the catalog. Unknown keys
    /// substitute the fallback block (logged) and never abort setup.
    pub fn new(seed: u32, registry: &BlockRegistry) -> Self {
        Self {
            seed,
            height_noise: Perlin::new(seed),
            air: registry.air(),
            bedrock: registry.get_or_fallback("bedrock"),
            grass: registry.get_or_fallback("grass"),
            stone: registry.get_or_fallback("stone"),
        }
    }

    /// Terrain height for a world column, in tiles above the floor.
    /// Continuous across chunk boundaries because it is sampled in world
    /// coordinates only.
    pub fn column_height(&self, wx: i32, wz: i32) -> i32 {
        let sample = self.height_noise.get([
            (wx as f64 + HEIGHT_NOISE_OFFSET) * HEIGHT_NOISE_FREQUENCY,
            (wz as f64 + HEIGHT_NOISE_OFFSET) * HEIGHT_NOISE_FREQUENCY,
        ]);
        // Perlin is in [-1, 1]; remap to [0, 1] before scaling.
        let normalized = ((sample + 1.0) * 0.5).clamp(0.0, 1.0);
        let height = (normalized * HEIGHT_NOISE_AMPLITUDE).ceil() as i32 + HEIGHT_BASE;
        height.min(CHUNK_HEIGHT - 1)
    }

    fn filler(&self, wx: i32, y: i32, wz: i32) -> BlockId {
        let jitter = salted_hash(self.seed, wx, y, wz) % STONE_DEPTH_JITTER;
        if y > STONE_DEPTH_FLOOR + jitter as i32 {
            self.stone
        } else {
            self.grass
        }
    }
}

/// Synthesize the tile buffer for one chunk. Pure: no side effects, and
/// identical output for identical `(params, coord)`.
pub fn generate_tiles(params: &TerrainParams, coord: ChunkCoord) -> Box<[Tile]> {
    let mut tiles = vec![Tile::new(params.air); CHUNK_VOLUME].into_boxed_slice();
    let base_x = coord.x * CHUNK_SIZE;
    let base_z = coord.z * CHUNK_SIZE;

    for lz in 0..CHUNK_SIZE {
        for lx in 0..CHUNK_SIZE {
            let wx = base_x + lx;
            let wz = base_z + lz;
            let height = params.column_height(wx, wz);

            for y in 0..CHUNK_HEIGHT {
                let block = if y == 0 {
                    params.bedrock
                } else if y < height {
                    params.filler(wx, y, wz)
                } else {
                    params.air
                };
                let idx = (y * CHUNK_SIZE * CHUNK_SIZE + lz * CHUNK_SIZE + lx) as usize;
                tiles[idx].set_block(block);
            }
        }
    }

    tiles
}

/// A unit of generation work. At most one outstanding request exists per
/// coordinate; `attempt` counts bounded retries after worker failures.
#[derive(Copy, Clone, Debug)]
pub struct GenerationRequest {
    pub coord: ChunkCoord,
    pub attempt: u32,
}

/// Failure of a single generation job. Isolated per chunk: it never takes
/// down the pool or sibling generations.
#[derive(Clone, Debug)]
pub struct GenerationError {
    pub coord: ChunkCoord,
    pub message: String,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation of chunk ({}, {}) failed: {}",
            self.coord.x, self.coord.z, self.message
        )
    }
}

impl std::error::Error for GenerationError {}

pub struct GenerationResult {
    pub coord: ChunkCoord,
    pub attempt: u32,
    pub outcome: Result<Box<[Tile]>, GenerationError>,
}

/// Job body run by the workers. Boxed so tests can inject failing jobs.
pub type GenerateFn = Arc<dyn Fn(ChunkCoord) -> Box<[Tile]> + Send + Sync>;

/// Worker pool driving chunk generation off the simulation tick.
pub struct ChunkGenerator {
    request_tx: Option<mpsc::Sender<GenerationRequest>>,
    completed: Arc<Mutex<VecDeque<GenerationResult>>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ChunkGenerator {
    pub fn from_params(params: Arc<TerrainParams>, worker_count: usize) -> Self {
        Self::new(
            Arc::new(move |coord| generate_tiles(&params, coord)),
            worker_count,
        )
    }

    pub fn new(generate: GenerateFn, worker_count: usize) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<GenerationRequest>();
        let request_rx = Arc::new(Mutex::new(request_rx));
        let completed = Arc::new(Mutex::new(VecDeque::new()));

        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                let request_rx = Arc::clone(&request_rx);
                let completed = Arc::clone(&completed);
                let generate = Arc::clone(&generate);
                thread::Builder::new()
                    .name(format!("chunk-gen-{worker_id}"))
                    .spawn(move || worker_loop(&request_rx, &completed, &generate))
                    .expect("spawning chunk generation worker failed")
            })
            .collect();

        Self {
            request_tx: Some(request_tx),
            completed,
            workers,
        }
    }

    /// Queue a chunk for generation. Non-blocking; the caller guarantees at
    /// most one outstanding request per coordinate by checking index
    /// presence before submitting.
    pub fn submit(&self, request: GenerationRequest) {
        let Some(tx) = &self.request_tx else {
            return;
        };
        if tx.send(request).is_err() {
            log::error!(
                "generation request for chunk ({}, {}) dropped: worker pool is gone",
                request.coord.x,
                request.coord.z
            );
        }
    }

    /// Pop one completion. The lock is held only for the pop; the caller
    /// processes the result outside it.
    pub fn drain_one(&self) -> Option<GenerationResult> {
        self.completed
            .lock()
            .expect("completion queue lock poisoned")
            .pop_front()
    }
}

impl Drop for ChunkGenerator {
    fn drop(&mut self) {
        // Closing the channel ends the worker loops.
        self.request_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    request_rx: &Mutex<mpsc::Receiver<GenerationRequest>>,
    completed: &Mutex<VecDeque<GenerationResult>>,
    generate: &GenerateFn,
) {
    loop {
        // Hold the receiver lock only while waiting for one request.
        let request = {
            let rx = request_rx.lock().expect("request channel lock poisoned");
            match rx.recv() {
                Ok(request) => request,
                Err(_) => return,
            }
        };

        let coord = request.coord;
        let outcome = catch_unwind(AssertUnwindSafe(|| generate(coord))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            log::warn!("chunk generation worker panicked on ({}, {}): {message}", coord.x, coord.z);
            GenerationError { coord, message }
        });

        completed
            .lock()
            .expect("completion queue lock poisoned")
            .push_back(GenerationResult {
                coord,
                attempt: request.attempt,
                outcome,
            });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockRegistry;
    use std::time::{Duration, Instant};

    fn wait_for_completion(generator: &ChunkGenerator) -> GenerationResult {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = generator.drain_one() {
                return result;
            }
            assert!(Instant::now() < deadline, "generation timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let registry = BlockRegistry::from_embedded();
        let params = TerrainParams::new(1337, &registry);
        let coord = ChunkCoord::new(-3, 7);
        let a = generate_tiles(&params, coord);
        let b = generate_tiles(&params, coord);
        assert_eq!(a, b);

        let other_seed = TerrainParams::new(1338, &registry);
        let c = generate_tiles(&other_seed, coord);
        assert_ne!(a, c, "different seeds should disagree somewhere");
    }

    #[test]
    fn columns_are_continuous_across_chunk_boundaries() {
        let registry = BlockRegistry::from_embedded();
        let params = TerrainParams::new(42, &registry);
        // The column at world x=16 belongs to chunk (1, 0); its height must
        // not depend on which chunk samples it.
        for wz in 0..CHUNK_SIZE {
            let h = params.column_height(CHUNK_SIZE, wz);
            assert!(h >= HEIGHT_BASE && h < CHUNK_HEIGHT);
            assert_eq!(h, params.column_height(CHUNK_SIZE, wz));
        }
    }

    #[test]
    fn column_layout_matches_spec() {
        let registry = BlockRegistry::from_embedded();
        let params = TerrainParams::new(7, &registry);
        let coord = ChunkCoord::new(0, 0);
        let tiles = generate_tiles(&params, coord);
        let bedrock = registry.get_by_key("bedrock").unwrap();
        let air = registry.air();

        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let height = params.column_height(lx, lz);
                let at = |y: i32| {
                    tiles[(y * CHUNK_SIZE * CHUNK_SIZE + lz * CHUNK_SIZE + lx) as usize].block()
                };
                assert_eq!(at(0), bedrock);
                for y in 1..height {
                    assert!(registry.is_solid(at(y)), "hole at ({lx}, {y}, {lz})");
                }
                for y in height..CHUNK_HEIGHT {
                    assert_eq!(at(y), air, "floating tile at ({lx}, {y}, {lz})");
                }
            }
        }
    }

    #[test]
    fn worker_pool_round_trips_a_request() {
        let registry = BlockRegistry::from_embedded();
        let params = Arc::new(TerrainParams::new(9, &registry));
        let generator = ChunkGenerator::from_params(Arc::clone(&params), 2);

        let coord = ChunkCoord::new(4, -4);
        generator.submit(GenerationRequest { coord, attempt: 0 });
        let result = wait_for_completion(&generator);
        assert_eq!(result.coord, coord);
        let tiles = result.outcome.expect("generation should succeed");
        assert_eq!(&tiles, &generate_tiles(&params, coord));
    }

    #[test]
    fn worker_panic_is_isolated_per_chunk() {
        let registry = BlockRegistry::from_embedded();
        let params = Arc::new(TerrainParams::new(11, &registry));
        let inner = Arc::clone(&params);
        let generate: GenerateFn = Arc::new(move |coord| {
            if coord == ChunkCoord::new(0, 0) {
                panic!("injected failure");
            }
            generate_tiles(&inner, coord)
        });
        let generator = ChunkGenerator::new(generate, 1);

        generator.submit(GenerationRequest {
            coord: ChunkCoord::new(0, 0),
            attempt: 0,
        });
        generator.submit(GenerationRequest {
            coord: ChunkCoord::new(1, 0),
            attempt: 0,
        });

        let first = wait_for_completion(&generator);
        assert_eq!(first.coord, ChunkCoord::new(0, 0));
        let error = first.outcome.err().expect("injected failure expected");
        assert!(error.message.contains("injected failure"));

        // The same worker must survive to serve the sibling request.
        let second = wait_for_completion(&generator);
        assert_eq!(second.coord, ChunkCoord::new(1, 0));
        assert!(second.outcome.is_ok());
    }
}
