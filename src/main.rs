//! Headless simulation driver: streams chunks around a wandering viewer,
//! turns the camera every few seconds, and reports what the world did.

use cgmath::{vec2, vec3, Vector3};
use clap::Parser;
use isoworld::camera::drawables::{Drawable, DrawableLifecycle};
use isoworld::world::{ViewerTracker, World, WorldConfig};
use isoworld::{BlockRegistry, ChunkCoord, IsometricProjector, ViewDirection, CHUNK_HEIGHT};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Isometric sandbox world simulation")]
struct Args {
    /// World generation seed.
    #[arg(long, default_value_t = 0)]
    seed: u32,

    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Chunk generation worker threads.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Chunks within this distance of the viewer stay loaded.
    #[arg(long, default_value_t = 30.0)]
    load_radius: f32,

    /// Chunks beyond this distance are unloaded.
    #[arg(long, default_value_t = 50.0)]
    unload_radius: f32,
}

struct WanderingViewer {
    position: Vector3<f32>,
}

impl WanderingViewer {
    fn advance(&mut self, dt: f32) {
        // Slow drift along +x so streaming has to work.
        self.position.x += 4.0 * dt;
    }
}

impl ViewerTracker for WanderingViewer {
    fn viewer_position(&self) -> Vector3<f32> {
        self.position
    }
}

/// Marker drawable that stays visible while its world position projects
/// near the screen origin.
struct Beacon {
    position: Vector3<f32>,
    updates: u32,
}

impl Drawable for Beacon {
    fn is_visible(&self, projector: &IsometricProjector) -> bool {
        let screen = projector.project(self.position);
        screen.x.abs() < 4000.0 && screen.y.abs() < 4000.0
    }
    fn on_attach_visual(&mut self) {
        log::debug!("beacon visual attached");
    }
    fn on_detach_visual(&mut self) {
        log::debug!("beacon visual detached");
    }
    fn update(&mut self, _projector: &IsometricProjector) {
        self.updates += 1;
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let registry = Arc::new(BlockRegistry::from_embedded());
    let mut world = World::new(
        WorldConfig {
            seed: args.seed,
            load_radius: args.load_radius,
            unload_radius: args.unload_radius,
            worker_count: args.workers,
            max_retries: 3,
        },
        Arc::clone(&registry),
    );

    let mut projector = IsometricProjector::new(ViewDirection::NorthEast);
    let mut drawables = DrawableLifecycle::new();
    drawables.enqueue(Box::new(Beacon {
        position: vec3(8.0, 16.0, 8.0),
        updates: 0,
    }));

    let mut viewer = WanderingViewer {
        position: vec3(8.0, 16.0, 8.0),
    };

    let dt = 1.0 / 60.0;
    for tick in 0..args.ticks {
        viewer.advance(dt);
        world.tick(dt as f64, &viewer);

        // A quarter turn every five seconds keeps the projector exercised.
        if tick % 300 == 299 {
            projector.request_turn(true);
            log::info!("turning camera clockwise toward {:?}", projector.direction());
        }
        projector.tick(dt);
        drawables.tick(&projector);
    }

    let p = viewer.viewer_position();
    let surface = world.surface_height(p.x.floor() as i32, p.z.floor() as i32);
    log::info!(
        "after {} ticks ({:.1}s world time): {} loaded chunks, surface under viewer at y={}",
        args.ticks,
        world.world_time(),
        world.loaded_chunk_count(),
        surface
    );

    let ray_start = vec3(p.x, CHUNK_HEIGHT as f32, p.z);
    match world.ray_trace(ray_start, vec3(0.0, -1.0, 0.0)) {
        Some(hit) => log::info!(
            "downward ray from the viewer column hit {:?} (screen {:?})",
            hit.tile,
            projector.project(hit.point)
        ),
        None => log::warn!("downward ray from the viewer column missed"),
    }

    if let Some(chunk) = world.chunk(ChunkCoord::new(0, 0)) {
        log::info!("origin chunk state: {:?}", chunk.state());
    }

    // Exercise picking: the cursor at the screen origin maps back to a
    // world-space ray.
    let (origin, direction) = projector.ray_at_screen_position(vec2(0.0, 0.0));
    log::debug!("screen-origin pick ray: origin {origin:?}, direction {direction:?}");
}
