//! Grasp placement search CLI.
//!
//! Runs the placement search against the reference tabletop scene:
//! - `first`: find one placement and commit the robot to it
//! - `search`: stream validated placements
//! - `collect`: batch-collect goals under a time budget
//! - `info`: print workspace crate versions and the scene layout

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use basegrasp_kinematics::{MobileArm, SceneConfig, SideGrasp, TabletopScene};
use basegrasp_search::prelude::*;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Mobile-manipulator grasp placement search.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Common {
    /// Search configuration (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Scene description (TOML). Defaults to the built-in tabletop.
    #[arg(long, global = true)]
    scene: Option<PathBuf>,

    /// Root seed; overrides the configuration file.
    #[arg(short, long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the first valid placement and apply it to the robot.
    First,

    /// Stream validated placements.
    Search {
        /// Number of placements to print.
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Random grasp order and random placements.
        #[arg(short, long)]
        random: bool,

        /// Give up after this many seconds without a solution.
        #[arg(short, long)]
        giveup: Option<f64>,
    },

    /// Collect goals from the joint distribution of all grasp models.
    Collect {
        /// Number of goals.
        #[arg(short = 'n', long, default_value_t = 10)]
        goals: usize,

        /// Time budget in seconds.
        #[arg(short, long)]
        timeout: Option<f64>,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_search_config(common: &Common) -> Result<SearchConfig> {
    let mut config = match &common.config {
        Some(path) => SearchConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SearchConfig::default(),
    };
    if let Some(seed) = common.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn load_scene(path: Option<&Path>) -> Result<TabletopScene> {
    let config = match path {
        Some(path) => SceneConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SceneConfig::default(),
    };
    Ok(TabletopScene::build(&config)?)
}

fn model_pairs(scene: &TabletopScene) -> Vec<ModelPair<'_, MobileArm, SideGrasp>> {
    scene
        .catalogs
        .iter()
        .map(|catalog| ModelPair::new(&scene.reachability, catalog, &scene.manipulator))
        .collect()
}

fn print_record(n: usize, record: &SolutionRecord<SideGrasp>) {
    let base = record.planar();
    println!(
        "{n:>3}: grasp {} approach={:+.3} base=({:+.3}, {:+.3}, {:+.3}) joints={:.3?}",
        record.grasp_id,
        record.grasp.approach,
        base.x,
        base.y,
        base.heading,
        record.values.as_slice()
    );
}

fn print_stats(stats: &SearchStats) {
    println!(
        "\ncandidates={} accepted={} collisions={} unreachable={} obstructed={} unclassified={} errors={}",
        stats.candidates,
        stats.accepted,
        stats.collisions,
        stats.unreachable,
        stats.obstructed,
        stats.unclassified,
        stats.collaborator_errors + stats.invalid
    );
    if let Some(rate) = stats.acceptance_rate() {
        println!("acceptance rate: {:.1}%", rate * 100.0);
    }
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_first(scene: &TabletopScene, config: SearchConfig) -> Result<()> {
    let pairs = model_pairs(scene);
    let planner = PlacementPlanner::new(scene.robot.id(), pairs.clone(), config)?;
    let mut robot = scene.robot.clone();

    let record = planner.first_placement(&mut robot)?;
    print_record(1, &record);

    apply_solution(&mut robot, &pairs[record.pair().0], &record)?;
    let base = PlanarPose::from_transform(&robot.transform());
    println!(
        "robot committed: base=({:+.3}, {:+.3}, {:+.3}) joints={:.3?}",
        base.x,
        base.y,
        base.heading,
        robot.joint_values().as_slice()
    );
    Ok(())
}

fn run_search(scene: &TabletopScene, config: SearchConfig, count: usize) -> Result<()> {
    let planner = PlacementPlanner::new(scene.robot.id(), model_pairs(scene), config)?;
    let mut robot = scene.robot.clone();
    let mut stream = planner.valid_placements(&mut robot);

    for n in 1..=count {
        match stream.next() {
            Some(Ok(record)) => print_record(n, &record),
            Some(Err(err)) if err.is_recoverable() => {
                println!("search stopped after {} placements: {err}", n - 1);
                break;
            }
            Some(Err(err)) => return Err(err.into()),
            None => break,
        }
    }
    print_stats(stream.stats());
    Ok(())
}

fn run_collect(scene: &TabletopScene, config: SearchConfig) -> Result<()> {
    let planner = PlacementPlanner::new(scene.robot.id(), model_pairs(scene), config)?;
    let mut robot = scene.robot.clone();

    let batch = planner.collect_goals(&mut robot)?;
    for (n, record) in batch.goals.iter().enumerate() {
        print_record(n + 1, record);
    }
    println!("\nfound {} goals ({} failures)", batch.goals.len(), batch.failures);
    if batch.exhausted {
        println!("sampler ran dry before {} goals", planner.config().goal_count);
    }
    print_stats(&batch.stats);
    Ok(())
}

fn run_info(scene: &TabletopScene) {
    println!("basegrasp v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  basegrasp-core       {}", env!("CARGO_PKG_VERSION"));
    println!("  basegrasp-search     {}", env!("CARGO_PKG_VERSION"));
    println!("  basegrasp-kinematics {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("scene:");
    println!("  arm dof:   {}", scene.manipulator.chain().dof());
    println!("  obstacles: {}", scene.manipulator.world().obstacles.len());
    for (i, catalog) in scene.catalogs.iter().enumerate() {
        let t = catalog.object().translation;
        println!("  object {i}: ({:+.3}, {:+.3}) with {} grasps", t.x, t.y, catalog.grasps().len());
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_search_config(&cli.common)?;
    let scene = load_scene(cli.common.scene.as_deref())?;
    info!(objects = scene.catalogs.len(), seed = config.seed, "scene ready");

    match cli.command {
        Some(Commands::First) | None => run_first(&scene, config),
        Some(Commands::Search { count, random, giveup }) => {
            if random {
                config = config.with_randomization(true, true);
            }
            if giveup.is_some() {
                config.giveup_time_secs = giveup;
            }
            run_search(&scene, config, count)
        }
        Some(Commands::Collect { goals, timeout }) => {
            config.goal_count = goals;
            if timeout.is_some() {
                config.collect_timeout_secs = timeout;
            }
            run_collect(&scene, config)
        }
        Some(Commands::Info) => {
            run_info(&scene);
            Ok(())
        }
    }
}
