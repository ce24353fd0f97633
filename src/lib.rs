//! An isometric sandbox world engine: streamed voxel chunks with
//! procedural terrain, grid raycasting, and a pixel-art projection camera.
//!
//! The world is a sparse grid of 16×32×16 chunks kept resident around a
//! viewer by [`world::World::tick`]. Terrain is generated off-thread and
//! deterministically from a seed; the camera side handles screen-space
//! projection, depth sorting, tile picking, and drawable lifecycles.

pub mod block;
pub mod camera;
pub mod world;

pub use block::{Block, BlockId, BlockRegistry};
pub use camera::{IsometricProjector, ViewDirection};
pub use world::chunk::{ChunkCoord, TilePos, CHUNK_HEIGHT, CHUNK_SIZE};
pub use world::{World, WorldConfig};
