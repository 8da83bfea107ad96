//! Structure of sweep configuration files.
//!
//! A configuration file is a JSON object describing the engine, where to put
//! its output, and the parameter space to explore. See [SweepConfig].

use crate::engine::Engine;
use crate::error::{Error, JsonIoError, Result};
use crate::serde_utils::{multiline_string, optional_seconds, required_string};
use crate::spec::{Advance, Generations, GridAxes, MutationAxis, SizeAxis, SweepKind, SweepSpec, Variant};
use crate::stats::KeyPath;
use crate::script::Sharding;
use crate::sweep::Sweep;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_output() -> PathBuf {
    PathBuf::from("data")
}

/// Static description of a sweep. Each configuration file contains one of these.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Filesystem path of this configuration file.
    #[serde(skip)]
    pub path: PathBuf,

    /// Name of the sweep, used to name its output directory.
    #[serde(deserialize_with = "required_string")]
    pub name: String,

    /// User facing documentation message.
    #[serde(default, deserialize_with = "multiline_string")]
    pub description: String,

    /// Filesystem path of the engine's executable program, relative to this
    /// file. A bare program name is looked up on the PATH instead.
    pub engine: PathBuf,

    /// Extra command line arguments for the engine.
    #[serde(default)]
    pub engine_args: Vec<String>,

    /// Directory to create the sweep's output directory in, relative to this file.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Seconds before an engine invocation is killed.
    #[serde(default, deserialize_with = "optional_seconds")]
    pub timeout: Option<Duration>,

    /// Which number to extract from each stats file.
    #[serde(default)]
    pub key: KeyPath,

    #[serde(default)]
    pub sharding: Sharding,

    /// Maximum number of engine processes to run at once, when sharded.
    #[serde(default)]
    pub jobs: Option<usize>,

    pub sweep: SweepDef,

    /// Configuration files may include extra information.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SweepConfig {
    /// Load a sweep configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref(); // Convert into a proper &Path.
        let config_error = |source: JsonIoError| Error::Config {
            path: path.into(),
            source,
        };
        let data = std::fs::read_to_string(path).map_err(|err| config_error(err.into()))?;
        let mut this: SweepConfig = serde_json::from_str(&data).map_err(|err| config_error(err.into()))?;
        this.path = path.into();
        this.normalize_paths();
        for key in this.extra.keys() {
            tracing::debug!("{path:?}: ignoring unrecognized field \"{key}\"");
        }
        Ok(this)
    }

    fn normalize_paths(&mut self) {
        let base = self.path.parent().unwrap_or(Path::new("")).to_path_buf();
        if self.engine.is_relative() && self.engine.components().count() > 1 {
            self.engine = base.join(&self.engine);
        }
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
    }

    pub fn engine(&self) -> Engine {
        let mut engine = Engine::new(&self.engine).args(self.engine_args.iter().cloned());
        if let Some(timeout) = self.timeout {
            engine = engine.timeout(timeout);
        }
        engine
    }

    pub fn kind(&self) -> SweepKind {
        self.sweep.to_kind()
    }

    /// Assemble the sweep which this file describes.
    pub fn sweep(&self) -> Sweep {
        let mut sweep = Sweep::new(&self.name, self.kind(), self.engine())
            .output(&self.output)
            .key(self.key.clone())
            .sharding(self.sharding);
        if let Some(jobs) = self.jobs {
            sweep = sweep.jobs(jobs);
        }
        sweep
    }
}

/// Settings for one variant of a time-series sweep.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VariantDef {
    #[serde(deserialize_with = "required_string")]
    pub name: String,

    #[serde(deserialize_with = "required_string")]
    pub goal: String,

    #[serde(default)]
    pub optmem: Option<bool>,

    #[serde(default)]
    pub population_size: Option<u64>,

    #[serde(default)]
    pub mutation_rate: Option<f64>,
}

/// Description of the parameter space.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(deny_unknown_fields)]
pub enum SweepDef {
    #[serde(alias = "series")]
    Series {
        trials: u64,

        generations: Generations,

        #[serde(default)]
        advance: Option<Advance>,

        variants: Vec<VariantDef>,
    },

    #[serde(alias = "grid")]
    Grid {
        #[serde(deserialize_with = "required_string")]
        goal: String,

        #[serde(default)]
        optmem: Option<bool>,

        trials: u64,

        generations: Generations,

        #[serde(default)]
        advance: Option<Advance>,

        mutation: MutationAxis,

        size: SizeAxis,
    },

    #[serde(alias = "distribution")]
    Distribution {
        #[serde(deserialize_with = "required_string")]
        goal: String,

        #[serde(default)]
        optmem: Option<bool>,

        #[serde(default)]
        population_size: Option<u64>,

        #[serde(default)]
        mutation_rate: Option<f64>,

        trials: u64,

        generations: Generations,

        #[serde(default)]
        advance: Option<Advance>,
    },
}

impl SweepDef {
    pub fn to_kind(&self) -> SweepKind {
        let spec = |goal: &str, optmem, population_size, mutation_rate, trials, generations: &Generations| SweepSpec {
            goal: goal.to_string(),
            optmem,
            population_size,
            mutation_rate,
            trials,
            generations: generations.clone(),
        };
        let (kind, advance) = match self {
            SweepDef::Series {
                trials,
                generations,
                advance,
                variants,
            } => {
                let variants = variants
                    .iter()
                    .map(|def| {
                        Variant::new(
                            &def.name,
                            spec(
                                &def.goal,
                                def.optmem,
                                def.population_size,
                                def.mutation_rate,
                                *trials,
                                generations,
                            ),
                        )
                    })
                    .collect();
                (SweepKind::series(variants), advance)
            }
            SweepDef::Grid {
                goal,
                optmem,
                trials,
                generations,
                advance,
                mutation,
                size,
            } => {
                let axes = GridAxes {
                    mutation: *mutation,
                    size: *size,
                };
                let spec = spec(goal, *optmem, None, None, *trials, generations);
                (SweepKind::grid(spec, axes), advance)
            }
            SweepDef::Distribution {
                goal,
                optmem,
                population_size,
                mutation_rate,
                trials,
                generations,
                advance,
            } => {
                let spec = spec(goal, *optmem, *population_size, *mutation_rate, *trials, generations);
                (SweepKind::distribution(spec), advance)
            }
        };
        match advance {
            Some(advance) => kind.with_advance(*advance),
            None => kind,
        }
    }
}
