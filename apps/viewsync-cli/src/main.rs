use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glam::{IVec3, Vec3};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use viewsync_common::{DistanceMetric, EntityId, Placement, ViewerId, WorldId};
use viewsync_kernel::{BlockState, TickDeadline, Universe, World};
use viewsync_protocol::{BuiltinSynchronizer, MemorySession};
use viewsync_stream::{StreamConfig, ViewerHub, ViewerState, ViewerSync, viewable};

#[derive(Parser)]
#[command(name = "viewsync-cli", about = "CLI tool for viewsync operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML stream config; defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the base cell sends per tick
    #[arg(long, global = true)]
    chunks_per_tick: Option<u32>,

    /// Override the distance metric
    #[arg(long, global = true)]
    metric: Option<MetricArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    Chebyshev,
    Manhattan,
    Euclidean,
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Chebyshev => DistanceMetric::Chebyshev,
            MetricArg::Manhattan => DistanceMetric::Manhattan,
            MetricArg::Euclidean => DistanceMetric::Euclidean,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective configuration
    Info {
        /// Print the configuration as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// Simulate viewers walking through a generated world
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        /// Number of viewers
        #[arg(long, default_value = "2")]
        viewers: usize,
        /// View distance in cells
        #[arg(long, default_value = "3")]
        view: u32,
        /// Blocks each viewer walks per tick
        #[arg(long, default_value = "1.5")]
        speed: f32,
        /// Tick length in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,
        /// World generator seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Move the first viewer to a second world at this tick
        #[arg(long)]
        swap_at: Option<u64>,
        /// Edit a block next to the first viewer every N ticks (0 = never)
        #[arg(long, default_value = "10")]
        edit_every: u64,
    },
    /// List the cells of a view volume, shell by shell
    Volume {
        #[arg(short, long, default_value = "2")]
        radius: u32,
    },
}

type Builtin = BuiltinSynchronizer<Arc<MemorySession>>;

fn load_config(cli: &Cli) -> anyhow::Result<StreamConfig> {
    let mut config = match &cli.config {
        Some(path) => StreamConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    if let Some(chunks) = cli.chunks_per_tick {
        config.chunks_per_tick = chunks;
    }
    if let Some(metric) = cli.metric {
        config.metric = metric.into();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Info { json: true } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Info { json: false } => {
            println!("viewsync-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("stream: {}", viewsync_stream::crate_info());
            println!("priority radius: {} cells", config.priority_radius());
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Simulate {
            ticks,
            viewers,
            view,
            speed,
            tick_ms,
            seed,
            swap_at,
            edit_every,
        } => simulate(
            config,
            SimulateArgs {
                ticks,
                viewers,
                view,
                speed,
                tick_length: Duration::from_millis(tick_ms),
                seed,
                swap_at,
                edit_every,
            },
        )?,
        Commands::Volume { radius } => {
            let mut shells: BTreeMap<i32, Vec<IVec3>> = BTreeMap::new();
            for cell in viewable(IVec3::ZERO, radius, config.metric) {
                shells.entry(cell.abs().max_element()).or_default().push(cell);
            }
            let total: usize = shells.values().map(Vec::len).sum();
            println!("{:?} volume, radius {radius}: {total} cells", config.metric);
            for (shell, cells) in &shells {
                let preview: Vec<String> = cells
                    .iter()
                    .take(6)
                    .map(|c| format!("({}, {}, {})", c.x, c.y, c.z))
                    .collect();
                let more = if cells.len() > 6 { ", ..." } else { "" };
                println!("  shell {shell}: {:4} cells  {}{more}", cells.len(), preview.join(", "));
            }
        }
    }

    Ok(())
}

struct SimulateArgs {
    ticks: u64,
    viewers: usize,
    view: u32,
    speed: f32,
    tick_length: Duration,
    seed: u64,
    swap_at: Option<u64>,
    edit_every: u64,
}

fn simulate(config: StreamConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let mut universe = Universe::new();
    let home = universe.insert(World::new("overworld", args.seed));
    let away = universe.insert(World::new("nether", args.seed.wrapping_add(1)));

    let mut hub: ViewerHub<Builtin> = ViewerHub::new();
    let mut sessions: Vec<(ViewerId, Arc<MemorySession>)> = Vec::new();
    for i in 0..args.viewers {
        let session = Arc::new(MemorySession::new());
        let sync = BuiltinSynchronizer::new(Arc::clone(&session), config.snapshot_kind);
        let start = Vec3::new(0.0, 8.0, i as f32 * 40.0);
        let state = ViewerState::new(EntityId::new(), args.view).at(Placement::at(home, start));
        let viewer: ViewerSync<Builtin> = ViewerSync::new(config.clone(), state, sync)?;
        sessions.push((viewer.viewer(), session));
        hub.attach(viewer);
    }
    println!(
        "Simulating {} viewers for {} ticks (view {} cells, budget {}/tick)",
        args.viewers, args.ticks, args.view, config.chunks_per_tick
    );

    let mut clock = TickDeadline::start(args.tick_length);
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut failures = 0;
    for tick in 1..=args.ticks {
        clock.restart();

        for (id, _) in &sessions {
            let Some(viewer) = hub.get_mut(*id) else {
                continue;
            };
            let Some(mut placement) = viewer.state().live() else {
                continue;
            };
            if Some(tick) == args.swap_at && sessions.first().map(|(first, _)| first) == Some(id) {
                placement = Placement::at(away, universe.world(away)?.info().spawn);
                tracing::info!(viewer = %id, "moving viewer to second world");
            } else {
                placement.position.point.x += args.speed;
            }
            viewer.state_mut().set_placement(placement);
        }

        failures += hub.tick(&universe, &clock).len();

        if args.edit_every > 0 && tick % args.edit_every == 0 {
            edit_near_first_viewer(&universe, &mut hub, &sessions, tick)?;
        }

        for world in universe.worlds() {
            world.unload_unobserved();
        }
        universe.step();

        for (_, session) in &sessions {
            for message in session.take() {
                *counts.entry(message.kind()).or_default() += 1;
            }
        }

        if tick % 20 == 0 || tick == args.ticks {
            report(&hub, &universe, tick);
        }
    }

    println!("\nMessages sent:");
    for (kind, count) in &counts {
        println!("  {kind:<24} {count}");
    }
    println!(
        "Hub tick time: avg {:?}, max {:?} (last {} of {} ticks); transport failures: {failures}",
        hub.timer().average(),
        hub.timer().max(),
        hub.timer().count(),
        hub.timer().total_ticks()
    );
    Ok(())
}

fn edit_near_first_viewer(
    universe: &Universe,
    hub: &mut ViewerHub<Builtin>,
    sessions: &[(ViewerId, Arc<MemorySession>)],
    tick: u64,
) -> anyhow::Result<()> {
    let Some(placement) = sessions
        .first()
        .and_then(|(id, _)| hub.get(*id))
        .and_then(|v| v.state().stable())
    else {
        return Ok(());
    };
    let world = universe.world(placement.world())?;
    let block = placement.position.point.floor().as_ivec3() + IVec3::new(0, -1, 0);
    let change = world.set_block(block, BlockState::new((tick % 7) as u16 + 1, 0))?;
    let errors = hub.broadcast_block_update(world.observers(), &change);
    tracing::debug!(cell = %change.cell, failed = errors.len(), "block edited");
    Ok(())
}

fn report(hub: &ViewerHub<Builtin>, universe: &Universe, tick: u64) {
    let resident: usize = universe.worlds().map(World::resident_count).sum();
    println!("tick {tick}: {resident} resident cells");
    for viewer in hub.viewers() {
        let world: Option<WorldId> = viewer.state().stable().map(|p| p.world());
        let world_name = world
            .and_then(|id| universe.world(id).ok())
            .map(|w| w.info().name.as_str())
            .unwrap_or("-");
        let stats = viewer.stats();
        println!(
            "  viewer {} [{world_name}]: active {}, initialized {}, queued {}/{}, observed {}, last tick sent {} freed {}",
            viewer.viewer(),
            viewer.active_cells().len(),
            viewer.initialized_cells().len(),
            viewer.queues().priority.len(),
            viewer.queues().send.len(),
            viewer.observed_cells().len(),
            stats.sent,
            stats.freed,
        );
    }
}
