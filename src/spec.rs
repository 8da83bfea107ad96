//! Descriptions of the experiments to run.

use crate::error::{Error, Result};
use crate::naming::Coordinate;
use serde::{Deserialize, Serialize};

/// Parameters for one experiment against the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    /// Name of the engine's fitness target.
    pub goal: String,

    /// Memory optimization mode, or None to leave the engine's default.
    #[serde(default)]
    pub optmem: Option<bool>,

    /// Explicit population size for every new run.
    #[serde(default)]
    pub population_size: Option<u64>,

    /// Mutation rate in percent.
    #[serde(default)]
    pub mutation_rate: Option<f64>,

    /// Number of independent runs.
    pub trials: u64,

    pub generations: Generations,
}

impl SweepSpec {
    /// Export after every one of the given number of generations.
    pub fn new(goal: impl Into<String>, trials: u64, generations: u64) -> Self {
        Self {
            goal: goal.into(),
            optmem: None,
            population_size: None,
            mutation_rate: None,
            trials,
            generations: Generations::Count(generations),
        }
    }

    /// Export only at the given generations.
    pub fn with_checkpoints(mut self, checkpoints: Vec<u64>) -> Self {
        self.generations = Generations::Checkpoints(checkpoints);
        self
    }

    pub fn with_optmem(mut self, optmem: bool) -> Self {
        self.optmem = Some(optmem);
        self
    }

    pub fn with_population_size(mut self, size: u64) -> Self {
        self.population_size = Some(size);
        self
    }

    pub fn with_mutation_rate(mut self, percent: f64) -> Self {
        self.mutation_rate = Some(percent);
        self
    }

    /// Check the invariants which don't depend on the kind of sweep.
    pub fn validate(&self) -> Result<()> {
        check_word("goal", &self.goal)?;
        if self.trials < 1 {
            return Err(Error::invalid("trial count must be at least 1"));
        }
        if self.population_size == Some(0) {
            return Err(Error::invalid("population size must be at least 1"));
        }
        if let Some(percent) = self.mutation_rate {
            check_percent(percent)?;
        }
        self.generations.validate()
    }
}

/// When to export statistics during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Generations {
    /// Export after every generation from 1 through N.
    Count(u64),

    /// Export at exactly these generations, in strictly increasing order.
    /// Generation 0 means before the first advance.
    Checkpoints(Vec<u64>),
}

impl Generations {
    pub fn validate(&self) -> Result<()> {
        if let Generations::Checkpoints(list) = self {
            if list.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(Error::invalid(format!(
                    "generation checkpoints must be strictly increasing, got {list:?}"
                )));
            }
        }
        Ok(())
    }

    /// The generations at which statistics are exported, ascending.
    pub fn checkpoints(&self) -> Vec<u64> {
        match self {
            Generations::Count(count) => (1..=*count).collect(),
            Generations::Checkpoints(list) => list.clone(),
        }
    }

    /// Total number of generations a run advances through.
    pub fn last(&self) -> u64 {
        match self {
            Generations::Count(count) => *count,
            Generations::Checkpoints(list) => list.last().copied().unwrap_or(0),
        }
    }
}

/// How the builder advances a run between two export points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advance {
    /// One `next` command per generation.
    Stepwise,

    /// A single `next <count>` command covering the whole distance.
    Bulk,
}

/// A named configuration within a time-series sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,

    #[serde(flatten)]
    pub spec: SweepSpec,
}

impl Variant {
    pub fn new(name: impl Into<String>, spec: SweepSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Mutation rates `start + (i + 1) * step` for `i` in `0..count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationAxis {
    #[serde(default)]
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl MutationAxis {
    pub fn values(&self) -> Vec<f64> {
        (0..self.count).map(|i| self.start + (i + 1) as f64 * self.step).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::invalid("mutation axis has zero steps"));
        }
        if !self.start.is_finite() || !self.step.is_finite() || self.step == 0.0 {
            return Err(Error::invalid(format!(
                "mutation axis needs a finite, non-zero step, got start {} step {}",
                self.start, self.step
            )));
        }
        let values = self.values();
        values.iter().copied().try_for_each(check_percent)?;
        // Rates which round to the same f64 would share a file and a row.
        if let Some(pair) = values.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::invalid(format!(
                "mutation axis step {} is too small, rate {} repeats",
                self.step, pair[0]
            )));
        }
        Ok(())
    }
}

/// Population sizes `(j + 1) * step` for `j` in `0..count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeAxis {
    pub step: u64,
    pub count: usize,
}

impl SizeAxis {
    pub fn values(&self) -> Vec<u64> {
        (1..=self.count as u64).map(|j| j * self.step).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(Error::invalid("population size axis has zero steps"));
        }
        if self.step == 0 {
            return Err(Error::invalid("population size axis step must be at least 1"));
        }
        if self.step.checked_mul(self.count as u64).is_none() {
            return Err(Error::invalid("population size axis overflows"));
        }
        Ok(())
    }
}

/// The two axes of a grid sweep. Rows are mutation rates, columns are
/// population sizes, both in the order the axes produce them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxes {
    pub mutation: MutationAxis,
    pub size: SizeAxis,
}

/// The shape of a sweep's parameter space.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepKind {
    /// Statistics at every checkpoint, averaged per generation, for each variant.
    Series { variants: Vec<Variant>, advance: Advance },

    /// Final statistics for every mutation rate × population size cell.
    Grid {
        spec: SweepSpec,
        axes: GridAxes,
        advance: Advance,
    },

    /// Final statistics of every trial, for histograms.
    Distribution { spec: SweepSpec, advance: Advance },
}

impl SweepKind {
    pub fn series(variants: Vec<Variant>) -> Self {
        SweepKind::Series {
            variants,
            advance: Advance::Stepwise,
        }
    }

    pub fn grid(spec: SweepSpec, axes: GridAxes) -> Self {
        SweepKind::Grid {
            spec,
            axes,
            advance: Advance::Bulk,
        }
    }

    pub fn distribution(spec: SweepSpec) -> Self {
        SweepKind::Distribution {
            spec,
            advance: Advance::Bulk,
        }
    }

    /// Override the default advance mode.
    pub fn with_advance(mut self, mode: Advance) -> Self {
        match &mut self {
            SweepKind::Series { advance, .. }
            | SweepKind::Grid { advance, .. }
            | SweepKind::Distribution { advance, .. } => *advance = mode,
        }
        self
    }

    pub fn advance(&self) -> Advance {
        match self {
            SweepKind::Series { advance, .. }
            | SweepKind::Grid { advance, .. }
            | SweepKind::Distribution { advance, .. } => *advance,
        }
    }

    /// Number of trials every cell of the summary should receive.
    pub fn trials(&self) -> u64 {
        match self {
            SweepKind::Series { variants, .. } => variants.first().map(|variant| variant.spec.trials).unwrap_or(0),
            SweepKind::Grid { spec, .. } | SweepKind::Distribution { spec, .. } => spec.trials,
        }
    }

    /// Check every invariant of the sweep. Nothing is spawned or written
    /// before this passes.
    pub fn validate(&self) -> Result<()> {
        match self {
            SweepKind::Series { variants, .. } => {
                let Some(first) = variants.first() else {
                    return Err(Error::invalid("time-series sweep has no variants"));
                };
                for (index, variant) in variants.iter().enumerate() {
                    check_word("variant name", &variant.name)?;
                    variant.spec.validate()?;
                    if variants[..index].iter().any(|other| other.name == variant.name) {
                        return Err(Error::invalid(format!("duplicate variant \"{}\"", variant.name)));
                    }
                    if variant.spec.trials != first.spec.trials
                        || variant.spec.generations.checkpoints() != first.spec.generations.checkpoints()
                    {
                        return Err(Error::invalid(format!(
                            "variant \"{}\" must use the same trials and generations as \"{}\"",
                            variant.name, first.name
                        )));
                    }
                }
                Ok(())
            }
            SweepKind::Grid { spec, axes, .. } => {
                spec.validate()?;
                if spec.population_size.is_some() || spec.mutation_rate.is_some() {
                    return Err(Error::invalid(
                        "grid sweeps take their population size and mutation rate from the axes",
                    ));
                }
                axes.mutation.validate()?;
                axes.size.validate()
            }
            SweepKind::Distribution { spec, .. } => spec.validate(),
        }
    }

    /// Every coordinate of the sweep, in the order the builder visits them.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut coordinates = vec![];
        match self {
            SweepKind::Series { variants, .. } => {
                for variant in variants {
                    let checkpoints = variant.spec.generations.checkpoints();
                    for trial in 0..variant.spec.trials {
                        for &generation in &checkpoints {
                            coordinates.push(Coordinate::Series {
                                variant: variant.name.clone(),
                                trial,
                                generation,
                            });
                        }
                    }
                }
            }
            SweepKind::Grid { spec, axes, .. } => {
                for trial in 0..spec.trials {
                    for mutation in axes.mutation.values() {
                        for size in axes.size.values() {
                            coordinates.push(Coordinate::Grid { mutation, size, trial });
                        }
                    }
                }
            }
            SweepKind::Distribution { spec, .. } => {
                coordinates.extend((0..spec.trials).map(|trial| Coordinate::Final { trial }));
            }
        }
        coordinates
    }
}

/// Goals and variant names are sent as single words and used in file names.
fn check_word(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid(format!("{what} is empty")));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '\\') {
        return Err(Error::invalid(format!(
            "{what} \"{}\" must not contain whitespace or path separators",
            value.escape_debug()
        )));
    }
    Ok(())
}

fn check_percent(percent: f64) -> Result<()> {
    if percent.is_finite() && percent > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!("mutation rate must be a positive percentage, got {percent}")))
    }
}
