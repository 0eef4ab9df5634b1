use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use objspace_common::{Position, WorldObject};
use objspace_kernel::{ObjectRegistry, PlayerDirectory, RegistryConfig};
use objspace_session::{ObjectUpdate, Session, SlotDirectory, UpdateReceiver, drain};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "objspace-cli", about = "Drive the world object registry")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML registry config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and effective configuration
    Info,
    /// Replay the same-tile replacement scenario and print each client update
    Scenario,
    /// Hammer the registry from several threads and check tile uniqueness
    Stress {
        /// Worker threads
        #[arg(short, long, default_value = "8")]
        threads: u64,
        /// Operations per thread
        #[arg(short, long, default_value = "10000")]
        ops: usize,
        /// Connected players (every third slot is freed once all have joined)
        #[arg(short, long, default_value = "24")]
        players: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RegistryConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("objspace-cli v{}", env!("CARGO_PKG_VERSION"));
            print!("{}", config.to_yaml_string()?);
        }
        Commands::Scenario => run_scenario(config)?,
        Commands::Stress {
            threads,
            ops,
            players,
        } => run_stress(config, threads, ops, players)?,
    }

    Ok(())
}

fn run_scenario(config: RegistryConfig) -> anyhow::Result<()> {
    let directory = Arc::new(SlotDirectory::new(4));
    let registry = ObjectRegistry::new(Arc::clone(&directory) as Arc<dyn PlayerDirectory>, config);

    let standing = Position::new(12, 12, 0);
    let (viewer, mut rx) = Session::new(standing);
    directory.connect(viewer)?;

    let tile = Position::new(10, 10, 0);
    println!(
        "viewer at {standing}, planar distance to {tile} is {}",
        standing.planar_distance(&tile)
    );
    let a = WorldObject::interactable(1, tile);
    let b = WorldObject::interactable(2, tile);

    println!("register A at {tile}");
    registry.register(a)?;
    print_updates(&drain(&mut rx))?;

    println!("register B at {tile}");
    let evicted = registry.register(b)?;
    println!("evicted: {evicted:?}");
    print_updates(&drain(&mut rx))?;

    println!("registry: {:?}", registry.objects());
    anyhow::ensure!(registry.objects() == vec![b], "registry should hold only B");
    Ok(())
}

fn run_stress(
    config: RegistryConfig,
    threads: u64,
    ops: usize,
    players: usize,
) -> anyhow::Result<()> {
    let directory = Arc::new(SlotDirectory::new(players));
    let registry = ObjectRegistry::new(Arc::clone(&directory) as Arc<dyn PlayerDirectory>, config);

    let mut receivers = connect_players(&directory, players)?;
    tracing::info!(
        connected = directory.connected_count(),
        capacity = directory.capacity(),
        "directory ready"
    );

    std::thread::scope(|s| {
        for t in 0..threads {
            let registry = &registry;
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(t);
                for _ in 0..ops {
                    let position = Position::new(
                        rng.gen_range(0..16),
                        rng.gen_range(0..16),
                        rng.gen_range(0..4),
                    );
                    let object = WorldObject::interactable(rng.gen_range(0..4), position);
                    let result = match rng.gen_range(0..4) {
                        0 | 1 => registry.register(object).map(|_| ()),
                        2 => registry.unregister(&object).map(|_| ()),
                        _ => {
                            registry.remove_on_position(position);
                            Ok(())
                        }
                    };
                    if let Err(e) = result {
                        tracing::error!("operation failed: {e}");
                    }
                }
            });
        }
    });

    let objects = registry.objects();
    let mut positions: Vec<Position> = objects.iter().map(|o| o.position).collect();
    positions.sort();
    positions.dedup();
    anyhow::ensure!(
        positions.len() == objects.len() && objects.len() == registry.len(),
        "tile uniqueness violated: {} objects on {} positions",
        objects.len(),
        positions.len()
    );

    let delivered: usize = receivers.iter_mut().map(|rx| drain(rx).len()).sum();
    println!(
        "threads={threads} ops/thread={ops} objects={} updates queued={delivered}",
        objects.len()
    );
    Ok(())
}

/// Fill every slot, then free every third one so the directory has holes
/// spread through it. Returns the receivers of the sessions still connected.
fn connect_players(
    directory: &SlotDirectory,
    players: usize,
) -> anyhow::Result<Vec<UpdateReceiver>> {
    let mut receivers = Vec::with_capacity(players);
    for i in 0..players {
        let (session, rx) = Session::new(Position::new((i as i32 % 6) * 20, (i as i32 / 6) * 20, 0));
        let slot = directory.connect(session)?;
        receivers.push((slot, rx));
    }
    for slot in (2..players).step_by(3) {
        directory.disconnect(slot);
    }
    Ok(receivers
        .into_iter()
        .filter(|(slot, _)| slot % 3 != 2)
        .map(|(_, rx)| rx)
        .collect())
}

fn print_updates(updates: &[ObjectUpdate]) -> anyhow::Result<()> {
    if updates.is_empty() {
        println!("  (no updates)");
    }
    for update in updates {
        println!("  {}", serde_json::to_string(update)?);
    }
    Ok(())
}
