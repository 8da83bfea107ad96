//! Stand-in for the evolutionary engine, for testing sweeps end to end.
//!
//! Reads the command language on stdin and writes a small stats file for
//! every `export-stats` command. The exported median is either looked up by
//! file name in a JSON table, or computed as
//! `base + per_generation * generation + per_run * run`, where `run` counts
//! the `new` commands since the last `goal` command, starting from zero.

use anyhow::{Context, Result, bail};
use clap::Parser;
use evo_sweep::command::Command;
use serde_json::json;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mock_engine", allow_negative_numbers = true)]
struct Cli {
    #[arg(long, default_value_t = 0.0)]
    base: f64,

    #[arg(long, default_value_t = 1.0)]
    per_generation: f64,

    #[arg(long, default_value_t = 0.0)]
    per_run: f64,

    /// JSON object mapping stats file names to medians. Exports which are not
    /// listed are silently skipped.
    #[arg(long)]
    table: Option<PathBuf>,

    /// Exit with status 3 after executing this many commands.
    #[arg(long)]
    fail_after: Option<usize>,

    /// Print the received commands to stdout.
    #[arg(long)]
    echo: bool,
}

#[derive(Debug)]
struct Run {
    index: u64,
    size: u64,
    generation: u64,
}

#[derive(Debug, Default)]
struct State {
    optmem: bool,
    goal: Option<String>,
    mutation: Option<f64>,
    runs: u64,
    run: Option<Run>,
}

fn median(cli: &Cli, table: &Option<HashMap<String, f64>>, path: &Path, run: &Run) -> Option<f64> {
    match table {
        Some(table) => {
            let name = path.file_name()?.to_str()?;
            table.get(name).copied()
        }
        None => Some(cli.base + cli.per_generation * run.generation as f64 + cli.per_run * run.index as f64),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let table: Option<HashMap<String, f64>> = match &cli.table {
        Some(path) => {
            let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Some(serde_json::from_str(&data)?)
        }
        None => None,
    };

    let mut state = State::default();
    let mut executed = 0;
    let stdin = std::io::stdin();
    let mut stdin = stdin.lock();
    while let Some(command) = Command::read(&mut stdin)? {
        if cli.fail_after == Some(executed) {
            eprintln!("mock_engine: crashing after {executed} commands");
            std::process::exit(3);
        }
        executed += 1;
        if cli.echo {
            println!("{command}");
        }
        match command {
            Command::OptMem(enabled) => state.optmem = enabled,
            Command::Goal(goal) => {
                state.goal = Some(goal);
                state.runs = 0;
                state.run = None;
            }
            Command::New(size) => {
                if state.goal.is_none() {
                    bail!("\"new\" before \"goal\"");
                }
                state.run = Some(Run {
                    index: state.runs,
                    size: size.unwrap_or(1000),
                    generation: 0,
                });
                state.runs += 1;
            }
            Command::Mut(percent) => state.mutation = Some(percent),
            Command::Next(count) => {
                let Some(run) = &mut state.run else {
                    bail!("\"next\" before \"new\"");
                };
                run.generation += count;
            }
            Command::ExportStats(path) => {
                let Some(run) = &state.run else {
                    bail!("\"export-stats\" before \"new\"");
                };
                let Some(median) = median(&cli, &table, &path, run) else {
                    continue;
                };
                let stats = json!({
                    "goal": state.goal,
                    "optmem": state.optmem,
                    "mutation_rate": state.mutation,
                    "population_size": run.size,
                    "generation": run.generation,
                    "fitness": {"median": median, "mean": median, "max": median},
                });
                std::fs::write(&path, serde_json::to_vec(&stats)?)
                    .with_context(|| format!("exporting {}", path.display()))?;
            }
            Command::Exit => return Ok(()),
        }
    }
    Ok(())
}
