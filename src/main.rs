//! treegp - evolve expression trees against sampled data or a food-trail environment.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use treegp::ga::{self, Outcome};
use treegp::{Config, Pairs, Stateful, Target, Trail};

/// Tree-based genetic programming
#[derive(Parser, Debug)]
#[command(name = "treegp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults are used for missing keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Columnar `x y` samples to fit
    #[arg(short, long, required_unless_present = "trail", conflicts_with = "trail")]
    data: Option<PathBuf>,

    /// Food-trail map for an agent to walk (`#` food, `.` empty)
    #[arg(short, long)]
    trail: Option<PathBuf>,

    /// Number of independent trials (overrides the configuration)
    #[arg(long)]
    trials: Option<usize>,

    /// Master seed (overrides the configuration)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (overrides the configuration)
    #[arg(long)]
    threads: Option<usize>,

    /// Write per-generation statistics of the winning trial as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Log per-generation detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> treegp::Result<()> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None if args.trail.is_some() => Config::agent(),
        None => Config::default(),
    };
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate()?;

    let target: Box<dyn Target> = match (&args.data, &args.trail) {
        (Some(path), _) => Box::new(Pairs::load(path)?),
        (None, Some(path)) => Box::new(Stateful::new(Trail::load(path, config.ticks)?)),
        (None, None) => return Err(treegp::Error::Config("either --data or --trail is required".to_string())),
    };

    let (trial, outcome) = ga::run_trials(&config, target.as_ref())?;
    report(trial, &outcome, target.as_ref())?;

    if let Some(ref path) = args.stats {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &outcome.history)?;
        log::info!("wrote statistics to {}", path.display());
    }
    Ok(())
}

fn report(trial: usize, outcome: &Outcome, target: &dyn Target) -> treegp::Result<()> {
    println!("Best of trial {}:", trial);
    println!("{}", outcome.best);
    if outcome.best_ever.rank(&outcome.best).is_lt() {
        println!("Best seen in any generation:");
        println!("{}", outcome.best_ever);
    }
    println!();
    print!("{}", outcome.best.trace(target)?);
    Ok(())
}
