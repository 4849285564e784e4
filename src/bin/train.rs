//! Train a tabular Q-learning agent on the built-in side-scrolling level, or inspect a saved agent

use std::{path::PathBuf, sync::atomic::Ordering};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use sidescroll_rl::{
    algo::QLearningAgent, checkpoint::CheckpointStore, config::Config, env::Environment,
    gym::SideScroller, train::Trainer,
};

#[derive(Parser)]
#[command(name = "sidescroll-train")]
#[command(version, about = "Tabular Q-learning for side-scrolling levels", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent, resuming from a saved slot when one exists
    Train(TrainArgs),

    /// Print a summary of a saved agent
    Inspect(InspectArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// JSON config file; anything it leaves out keeps its default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the checkpoint slots
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Number of episodes to train for
    #[arg(short, long)]
    episodes: Option<u32>,

    /// Seed for the exploration RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Slot to restore before training
    #[arg(long, conflicts_with = "fresh")]
    resume: Option<String>,

    /// Start from an empty Q-table even if a saved agent exists
    #[arg(long)]
    fresh: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Slot to read
    #[arg(default_value = "agent_best")]
    slot: String,

    /// Directory holding the checkpoint slots
    #[arg(long, default_value = "saved_agents")]
    checkpoint_dir: PathBuf,

    /// Number of most recent episodes averaged into the recent reward
    #[arg(long, default_value_t = 10)]
    recent: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Train(args) => train(args),
        Commands::Inspect(args) => inspect(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = args.checkpoint_dir {
        config.checkpoint_dir = dir;
    }
    if let Some(episodes) = args.episodes {
        config.trainer.episodes = episodes;
    }
    if args.seed.is_some() {
        config.agent.seed = args.seed;
    }
    if args.fresh {
        config.resume_slot = None;
    } else if args.resume.is_some() {
        config.resume_slot = args.resume;
    }
    config.validate().context("Invalid configuration")?;

    let store = CheckpointStore::new(&config.checkpoint_dir);
    let env = SideScroller::new(config.level.clone());
    let agent = match &config.resume_slot {
        Some(slot) => {
            QLearningAgent::restore_or_new(&config.agent, env.action_count(), &store, slot)?
        }
        None => QLearningAgent::new(&config.agent, env.action_count())?,
    };

    let mut trainer = Trainer::new(env, agent, store, config.trainer.clone())?;
    let stop = trainer.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
        .context("Failed to install the Ctrl-C handler")?;

    let summary = trainer.run()?;
    info!(
        "{} after {} episodes, best reward: {:.1}",
        if summary.interrupted {
            "Stopped"
        } else {
            "Finished"
        },
        summary.episodes,
        summary.best_reward
    );
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let store = CheckpointStore::new(&args.checkpoint_dir);
    let checkpoint = store
        .load(&args.slot)
        .with_context(|| format!("Failed to load slot `{}`", args.slot))?;
    let metrics = &checkpoint.metrics;
    let table = &checkpoint.table;

    println!("slot:           {}", store.slot_dir(&args.slot).display());
    println!("episodes:       {}", metrics.episodes());
    println!("best reward:    {:.1}", metrics.best_reward());
    match metrics.recent_mean(args.recent) {
        Some(mean) => println!("recent reward:  {mean:.1} (last {})", args.recent),
        None => println!("recent reward:  -"),
    }
    println!(
        "visited states: {}/{} ({} actions)",
        table.visited_states(),
        table.state_count(),
        table.action_count()
    );
    Ok(())
}
