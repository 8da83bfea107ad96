use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use evo_sweep::config::SweepConfig;
use evo_sweep::naming::StatsLayout;
use evo_sweep::script::Sharding;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status of a sweep which ran to the end but lost some of its data.
const DEGRADED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "evo_sweep")]
#[command(about = "Run parameter sweeps against an evolutionary engine and summarize its statistics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShardingArg {
    #[value(name = "single")]
    Single,
    #[value(name = "per-trial")]
    PerTrial,
}

impl From<ShardingArg> for Sharding {
    fn from(value: ShardingArg) -> Self {
        match value {
            ShardingArg::Single => Sharding::Single,
            ShardingArg::PerTrial => Sharding::PerTrial,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a sweep and print its summary as JSON
    Run {
        config: PathBuf,
        /// Create the sweep's output directory here instead
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        sharding: Option<ShardingArg>,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Print the command scripts of a sweep without running the engine
    Script {
        config: PathBuf,
        /// Directory the scripts export into
        #[arg(long, default_value = "data")]
        dir: PathBuf,
        #[arg(long, value_enum)]
        sharding: Option<ShardingArg>,
    },
    /// Summarize the stats files of a sweep which already ran
    Aggregate {
        config: PathBuf,
        /// The sweep's output directory
        #[arg(long)]
        dir: PathBuf,
    },
}

fn load(path: &Path) -> Result<SweepConfig> {
    SweepConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn exit_code(complete: bool) -> ExitCode {
    if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(DEGRADED)
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            output,
            sharding,
            jobs,
        } => {
            let config = load(&config)?;
            let mut sweep = config.sweep();
            if let Some(output) = output {
                sweep = sweep.output(output);
            }
            if let Some(sharding) = sharding {
                sweep = sweep.sharding(sharding.into());
            }
            if let Some(jobs) = jobs {
                sweep = sweep.jobs(jobs);
            }
            let outcome = sweep.run()?;
            print_json(&outcome)?;
            Ok(exit_code(outcome.is_complete()))
        }
        Commands::Script { config, dir, sharding } => {
            let config = load(&config)?;
            let mut sweep = config.sweep();
            if let Some(sharding) = sharding {
                sweep = sweep.sharding(sharding.into());
            }
            let scripts = sweep.scripts(&StatsLayout::new(dir))?;
            let mut stdout = std::io::stdout().lock();
            for (index, script) in scripts.iter().enumerate() {
                if index > 0 {
                    writeln!(stdout)?;
                }
                script.write(&mut stdout)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Aggregate { config, dir } => {
            let config = load(&config)?;
            let summary = config.sweep().aggregate(&StatsLayout::new(dir))?;
            print_json(&summary)?;
            Ok(exit_code(summary.is_complete()))
        }
    }
}
