// =============================================================================
// playtrace: record human gameplay trajectories from an NES emulator
// =============================================================================
// Build & Run:
//   cargo build --release
//   cargo run --release -- record --rom kung_fu.nes --label alice
//   cargo run --release -- replay --rom kung_fu.nes --state data/alice/states/3/0000120.state
//   cargo run --release -- clean --label alice

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use playtrace::env::Env;
use playtrace::nes::{NES_HEIGHT, NES_WIDTH};
use playtrace::{
    Agent, EngineState, HumanAgent, IdAllocator, InputMapper, NesConfig, NesEnv, RandomAgent,
    Screen, Session, SessionConfig, SessionSummary, TrajectoryBuffer, UniqueIds, storage,
};

// =============================================================================
// Section 1: Setup
// =============================================================================

fn output_config(args: &OutputArgs) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(out) = &args.out {
        config.base_output_dir = out.clone();
    }
    if let Some(label) = &args.label {
        config.run_label = label.clone();
    }
    config.validate()?;
    Ok(config)
}

fn session_config(args: &SessionArgs) -> Result<SessionConfig> {
    let mut config = output_config(&args.output)?;
    if let Some(fps) = args.fps {
        config.ticks_per_second = fps;
    }
    if args.no_state {
        config.capture_engine_state = false;
    }
    Ok(config)
}

fn open_buffer(
    config: &SessionConfig,
    unique_ids: bool,
) -> Result<TrajectoryBuffer<Box<dyn IdAllocator>>> {
    let layout = config.layout();
    let ids: Box<dyn IdAllocator> = if unique_ids {
        Box::new(UniqueIds)
    } else {
        Box::new(layout.id_scanner())
    };
    let buffer = TrajectoryBuffer::new(layout, ids, config.capture_engine_state)
        .with_context(|| {
            format!(
                "Failed to prepare output under {}",
                config.base_output_dir.display()
            )
        })?;
    Ok(buffer)
}

fn load_snapshot(path: &Path) -> Result<EngineState> {
    let state = storage::read_state(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    Ok(state)
}

// =============================================================================
// Section 2: Recording
// =============================================================================

fn drive<A: Agent>(
    env: NesEnv,
    agent: A,
    buffer: TrajectoryBuffer<Box<dyn IdAllocator>>,
    config: SessionConfig,
    resume: Option<&EngineState>,
) -> Result<SessionSummary> {
    let mut session = Session::start(env, agent, buffer, config)?;
    if let Some(state) = resume {
        session.resume_from(state)?;
    }
    Ok(session.run()?)
}

fn record(args: &PlayArgs, resume: Option<&EngineState>) -> Result<()> {
    let config = session_config(&args.session)?;
    let nes_config = NesConfig::preset(&args.preset)
        .with_context(|| format!("Unknown preset '{}'", args.preset))?;
    let env = NesEnv::new(&args.rom, nes_config)?;
    let buffer = open_buffer(&config, args.session.unique_ids)?;
    info!(
        rom = %args.rom.display(),
        preset = %args.preset,
        fps = config.ticks_per_second,
        out = %config.layout().root().display(),
        traj = %buffer.traj_id(),
        "recording"
    );

    let summary = if args.random {
        let agent = RandomAgent::new(env.action_count(), args.steps, args.seed);
        drive(env, agent, buffer, config, resume)?
    } else {
        let mapper = InputMapper::nes();
        let screen = Screen::open(
            "playtrace",
            NES_WIDTH as usize,
            NES_HEIGHT as usize,
            args.scale,
        )?
        .with_close_key(mapper.meta_bindings().close);
        let agent = HumanAgent::new(screen, mapper);
        drive(env, agent, buffer, config, resume)?
    };

    info!(
        ticks = summary.ticks,
        trajectories = summary.trajectories_saved,
        transitions = summary.transitions_saved,
        rewinds = summary.rewinds,
        "session finished"
    );
    Ok(())
}

fn replay(args: &ReplayArgs) -> Result<()> {
    let state = load_snapshot(&args.state)?;
    record(&args.play, Some(&state))
}

// =============================================================================
// Section 3: Maintenance
// =============================================================================

fn clean(args: &CleanArgs) -> Result<()> {
    let config = output_config(&args.output)?;
    let layout = config.layout();
    let removed = storage::prune_empty(&layout)
        .with_context(|| format!("Failed to clean {}", layout.root().display()))?;
    for id in &removed {
        println!("{id}");
    }
    info!(removed = removed.len(), root = %layout.root().display(), "clean finished");
    Ok(())
}

// =============================================================================
// Section 4: CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "playtrace", about = "Record human gameplay trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play with the keyboard and record every step
    Record(PlayArgs),
    /// Continue recording from a saved engine snapshot
    Replay(ReplayArgs),
    /// Remove trajectories that never recorded a frame
    Clean(CleanArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// JSON session config; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    label: Option<String>,
}

#[derive(Args)]
struct SessionArgs {
    #[command(flatten)]
    output: OutputArgs,
    #[arg(long)]
    fps: Option<u32>,
    /// Do not snapshot or persist emulator state (disables rewind)
    #[arg(long, default_value_t = false)]
    no_state: bool,
    /// Name trajectories with random uuids instead of increasing numbers
    #[arg(long, default_value_t = false)]
    unique_ids: bool,
}

#[derive(Parser)]
struct PlayArgs {
    #[arg(long)]
    rom: PathBuf,
    #[arg(long, default_value = "kung-fu")]
    preset: String,
    #[arg(long, default_value = "2")]
    scale: u32,
    /// Drive the emulator with random actions instead of the keyboard
    #[arg(long, default_value_t = false)]
    random: bool,
    #[arg(long, default_value = "10000")]
    steps: u64,
    #[arg(long)]
    seed: Option<u64>,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser)]
struct ReplayArgs {
    #[arg(long)]
    state: PathBuf,
    #[command(flatten)]
    play: PlayArgs,
}

#[derive(Parser)]
struct CleanArgs {
    #[command(flatten)]
    output: OutputArgs,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Record(args) => record(args, None),
        Commands::Replay(args) => replay(args),
        Commands::Clean(args) => clean(args),
    }
}
