use std::collections::HashSet;
use std::hint::black_box;
use std::time::Instant;

use glam::{IVec3, Vec3};
use viewsync_common::{CellCoord, DistanceMetric, EntityId, Placement, Transform, WorldId};
use viewsync_kernel::{BlockChange, Chunk, Unbounded, World, WorldInfo};
use viewsync_stream::{
    CellQueue, LifecycleQueues, StreamConfig, SyncError, Synchronizer, ViewArea, ViewerState, ViewerSync,
    viewable,
};

/// Accepts everything and sends nothing.
struct Discard;

impl Synchronizer for Discard {
    fn send_cell(&mut self, chunk: &Chunk) -> Result<Vec<CellCoord>, SyncError> {
        Ok(vec![chunk.coord()])
    }

    fn free_cell(&mut self, _: CellCoord) -> Result<(), SyncError> {
        Ok(())
    }

    fn send_position(&mut self, _: EntityId, _: Transform) -> Result<(), SyncError> {
        Ok(())
    }

    fn world_changed(&mut self, _: &WorldInfo, _: Transform) -> Result<(), SyncError> {
        Ok(())
    }

    fn update_block(&mut self, _: &BlockChange) -> Result<(), SyncError> {
        Ok(())
    }
}

fn bench_viewable(radius: u32, metric: DistanceMetric, iterations: usize) {
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(viewable(black_box(IVec3::ZERO), radius, metric).count());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  viewable (r={radius}, {metric:?}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_recompute(radius: u32, iterations: usize) {
    let world = WorldId::new();
    // Half the volume already on the client, shifted by one cell.
    let initialized: CellQueue = viewable(IVec3::X, radius, DistanceMetric::Chebyshev)
        .map(|i| CellCoord::new(world, i))
        .filter(|c| c.y <= 0)
        .collect();
    let active: HashSet<CellCoord> = initialized.iter().collect();
    let area = ViewArea::new(CellCoord::new(world, IVec3::ZERO), radius, 1, DistanceMetric::Chebyshev);
    let mut queues = LifecycleQueues::new();

    let start = Instant::now();
    for _ in 0..iterations {
        black_box(queues.recompute(black_box(&area), &initialized, &active));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  recompute (r={radius}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_full_stream(view: u32, chunks_per_tick: u32) {
    let world = World::new("bench", 7).with_vertical_bounds(-64, 64);
    let config = StreamConfig {
        chunks_per_tick,
        ..StreamConfig::default()
    };
    let state = ViewerState::new(EntityId::new(), view)
        .at(Placement::at(world.id(), Vec3::new(8.0, 8.0, 8.0)));
    let Ok(mut sync) = ViewerSync::new(config, state, Discard) else {
        println!("  invalid config");
        return;
    };

    let start = Instant::now();
    let mut ticks = 0;
    loop {
        sync.finalize_tick(&world);
        if sync.pre_snapshot(&world, &Unbounded).is_err() {
            break;
        }
        sync.commit_snapshot();
        ticks += 1;
        if ticks > 1 && sync.queues().is_idle() {
            break;
        }
    }
    let elapsed = start.elapsed();
    println!(
        "  full stream (view={view}, budget={chunks_per_tick}): {} cells in {ticks} ticks, {:?}/tick, total {elapsed:?}",
        sync.active_cells().len(),
        elapsed / ticks.max(1),
    );
}

fn main() {
    println!("=== Stream Reconcile Benchmarks ===\n");

    println!("Viewable volume:");
    bench_viewable(4, DistanceMetric::Chebyshev, 10000);
    bench_viewable(8, DistanceMetric::Chebyshev, 1000);
    bench_viewable(8, DistanceMetric::Euclidean, 1000);

    println!("\nRecompute:");
    bench_recompute(4, 1000);
    bench_recompute(8, 100);

    println!("\nFull stream to idle:");
    bench_full_stream(3, 3);
    bench_full_stream(6, 16);

    println!("\n=== Done ===");
}
