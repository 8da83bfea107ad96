//! Runs a whole sweep: build the scripts, drive the engine, then reduce the
//! exported statistics into a summary.

use crate::aggregate::{self, Summary};
use crate::command::CommandScript;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::naming::StatsLayout;
use crate::script::{self, Sharding};
use crate::serde_utils;
use crate::spec::SweepKind;
use crate::stats::{KeyPath, StatsReader};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A sweep, ready to run.
#[derive(Debug, Clone)]
pub struct Sweep {
    name: String,
    kind: SweepKind,
    engine: Engine,
    output: PathBuf,
    key: KeyPath,
    sharding: Sharding,
    jobs: Option<usize>,
}

/// An engine invocation which did not exit cleanly.
#[derive(Debug, Serialize)]
pub struct EngineFailure {
    /// Index of the script which the engine was running.
    pub shard: usize,

    #[serde(serialize_with = "serde_utils::display")]
    pub error: Error,
}

/// Everything a finished sweep produced.
#[derive(Debug, Serialize)]
pub struct SweepOutcome {
    /// Where the stats files were exported.
    pub dir: PathBuf,
    pub engine_failures: Vec<EngineFailure>,
    pub summary: Summary,
}

impl SweepOutcome {
    /// True if every engine exited cleanly and every stats file was read.
    pub fn is_complete(&self) -> bool {
        self.engine_failures.is_empty() && self.summary.is_complete()
    }
}

impl Sweep {
    pub fn new(name: impl Into<String>, kind: SweepKind, engine: Engine) -> Self {
        Self {
            name: name.into(),
            kind,
            engine,
            output: PathBuf::from("data"),
            key: KeyPath::default(),
            sharding: Sharding::default(),
            jobs: None,
        }
    }

    /// Directory to create the sweep's own output directory in.
    pub fn output(mut self, root: impl AsRef<Path>) -> Self {
        self.output = root.as_ref().into();
        self
    }

    pub fn key(mut self, key: KeyPath) -> Self {
        self.key = key;
        self
    }

    pub fn sharding(mut self, sharding: Sharding) -> Self {
        self.sharding = sharding;
        self
    }

    /// Maximum number of engine processes to run at once.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SweepKind {
        &self.kind
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
            return Err(Error::invalid(format!(
                "sweep name \"{}\" must be a single word without path separators",
                self.name.escape_debug()
            )));
        }
        if self.jobs == Some(0) {
            return Err(Error::invalid("jobs must be at least 1"));
        }
        self.kind.validate()
    }

    /// The command scripts which would export into the given directory.
    pub fn scripts(&self, layout: &StatsLayout) -> Result<Vec<CommandScript>> {
        self.validate()?;
        script::build(&self.kind, layout, self.sharding)
    }

    /// Run the engine on every script, concurrently when there are several.
    ///
    /// Engine failures don't stop the other shards, they are returned so the
    /// caller can report them next to the degraded summary.
    pub fn execute(&self, layout: &StatsLayout) -> Result<Vec<EngineFailure>> {
        let scripts = self.scripts(layout)?;
        let run = |(shard, script): (usize, &CommandScript)| {
            let error = self.engine.run(script).err()?;
            tracing::warn!("engine shard {shard} of {}: {error}", scripts.len());
            Some(EngineFailure { shard, error })
        };
        if scripts.len() == 1 {
            return Ok(scripts.iter().enumerate().filter_map(run).collect());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.unwrap_or(0))
            .thread_name(|index| format!("engine-{index}"))
            .build()
            .map_err(std::io::Error::other)?;
        Ok(pool.install(|| scripts.par_iter().enumerate().filter_map(run).collect()))
    }

    /// Read back whatever the engine exported into the given directory.
    pub fn aggregate(&self, layout: &StatsLayout) -> Result<Summary> {
        let reader = StatsReader::new(layout.clone(), self.key.clone());
        aggregate::aggregate(&self.kind, &reader)
    }

    /// Run the whole sweep in a fresh output directory.
    pub fn run(&self) -> Result<SweepOutcome> {
        self.validate()?;
        let started = Instant::now();
        let layout = StatsLayout::namespaced(&self.output, &self.name)?;
        tracing::info!(
            "sweep {}: {} coordinates, exporting into {:?}",
            self.name,
            self.kind.coordinates().len(),
            layout.dir()
        );
        let engine_failures = self.execute(&layout)?;
        let summary = self.aggregate(&layout)?;
        let outcome = SweepOutcome {
            dir: layout.dir().into(),
            engine_failures,
            summary,
        };
        if outcome.is_complete() {
            tracing::info!("sweep {} finished in {:?}", self.name, started.elapsed());
        } else {
            tracing::warn!(
                "sweep {} finished in {:?} with {} engine failures and {} unreadable stats files",
                self.name,
                started.elapsed(),
                outcome.engine_failures.len(),
                outcome.summary.failures().len()
            );
        }
        Ok(outcome)
    }
}
