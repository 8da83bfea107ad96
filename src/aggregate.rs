//! Reduces repeated trials into summary tables.
//!
//! Every reduced cell reports how many trials actually contributed to it, and
//! every coordinate which could not be read is listed in the summary's
//! failures. A crashed or partial sweep therefore shows up as a degraded
//! summary instead of a silently biased mean.

use crate::error::{Error, Result};
use crate::naming::Coordinate;
use crate::serde_utils;
use crate::spec::{GridAxes, SweepKind, SweepSpec, Variant};
use crate::stats::ReadStats;
use rayon::prelude::*;
use serde::Serialize;

/// The mean of one statistic over the trials which contributed to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    /// None when no trial contributed.
    pub mean: Option<f64>,

    /// Number of trials which contributed to the mean.
    pub trials: usize,
}

impl Cell {
    /// Average the given values.
    ///
    /// The values are summed in sorted order, so the result is bit-for-bit
    /// identical no matter what order they arrive in.
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        let trials = values.len();
        let mean = (trials > 0).then(|| values.iter().sum::<f64>() / trials as f64);
        Self { mean, trials }
    }
}

/// A coordinate whose statistics could not be read.
#[derive(Debug, Serialize)]
pub struct Failure {
    pub coordinate: Coordinate,

    #[serde(serialize_with = "serde_utils::display")]
    pub error: Error,
}

/// Mean statistic per generation for one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub variant: String,

    /// One cell per checkpoint generation.
    pub cells: Vec<Cell>,
}

impl Series {
    pub fn means(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(|cell| cell.mean).collect()
    }
}

/// Result of a time-series sweep.
#[derive(Debug, Serialize)]
pub struct SummarySeries {
    /// The checkpoint generations, which index every series' cells.
    pub generations: Vec<u64>,
    pub series: Vec<Series>,
    pub expected_trials: u64,
    pub failures: Vec<Failure>,
}

impl SummarySeries {
    pub fn variant(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.variant == name)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a mutation rate × population size sweep.
///
/// Rows follow the mutation axis and columns follow the population size axis,
/// both in the order the axes were defined.
#[derive(Debug, Serialize)]
pub struct SummaryGrid {
    pub mutation_rates: Vec<f64>,
    pub population_sizes: Vec<u64>,
    pub cells: Vec<Vec<Cell>>,
    pub expected_trials: u64,
    pub failures: Vec<Failure>,
}

impl SummaryGrid {
    pub fn means(&self) -> Vec<Vec<Option<f64>>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.mean).collect())
            .collect()
    }

    /// Look up a cell by its axis values.
    pub fn get(&self, mutation: f64, size: u64) -> Option<&Cell> {
        let row = self.mutation_rates.iter().position(|&rate| rate == mutation)?;
        let column = self.population_sizes.iter().position(|&value| value == size)?;
        Some(&self.cells[row][column])
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One trial's final statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub trial: u64,
    pub value: f64,
}

/// Result of a final generation sweep: every trial's value, for histograms.
#[derive(Debug, Serialize)]
pub struct SummaryDistribution {
    /// The trials which were read successfully, in trial order.
    pub samples: Vec<Sample>,
    pub overall: Cell,
    pub expected_trials: u64,
    pub failures: Vec<Failure>,
}

impl SummaryDistribution {
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.value).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The summary produced by any kind of sweep.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Summary {
    Series(SummarySeries),
    Grid(SummaryGrid),
    Distribution(SummaryDistribution),
}

impl Summary {
    pub fn failures(&self) -> &[Failure] {
        match self {
            Summary::Series(summary) => &summary.failures,
            Summary::Grid(summary) => &summary.failures,
            Summary::Distribution(summary) => &summary.failures,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Read and reduce every coordinate of a sweep.
pub fn aggregate(kind: &SweepKind, reader: &impl ReadStats) -> Result<Summary> {
    kind.validate()?;
    Ok(match kind {
        SweepKind::Series { variants, .. } => Summary::Series(series(variants, reader)),
        SweepKind::Grid { spec, axes, .. } => Summary::Grid(grid(spec, axes, reader)),
        SweepKind::Distribution { spec, .. } => Summary::Distribution(distribution(spec, reader)),
    })
}

/// Reads the given coordinates in parallel. The values come back in the same
/// order as the coordinates, and the unreadable ones are split off.
fn read_all(coordinates: Vec<Coordinate>, reader: &impl ReadStats) -> (Vec<(Coordinate, f64)>, Vec<Failure>) {
    let results: Vec<_> = coordinates
        .into_par_iter()
        .map(|coordinate| {
            let result = reader.read(&coordinate);
            (coordinate, result)
        })
        .collect();
    let mut values = Vec::with_capacity(results.len());
    let mut failures = vec![];
    for (coordinate, result) in results {
        match result {
            Ok(record) => values.push((coordinate, record.value)),
            Err(error) => {
                if error.is_per_coordinate() {
                    tracing::debug!("skipping {coordinate}: {error}");
                } else {
                    tracing::warn!("skipping {coordinate}: {error}");
                }
                failures.push(Failure { coordinate, error });
            }
        }
    }
    if !failures.is_empty() {
        tracing::warn!(
            "{} of {} stats files could not be read, summary is degraded",
            failures.len(),
            values.len() + failures.len()
        );
    }
    (values, failures)
}

/// Mean per generation, for each variant separately.
pub fn series(variants: &[Variant], reader: &impl ReadStats) -> SummarySeries {
    let generations = variants
        .first()
        .map(|variant| variant.spec.generations.checkpoints())
        .unwrap_or_default();
    let expected_trials = variants.first().map(|variant| variant.spec.trials).unwrap_or(0);
    let coordinates = SweepKind::series(variants.to_vec()).coordinates();
    let (values, failures) = read_all(coordinates, reader);

    let mut buckets = vec![vec![vec![]; generations.len()]; variants.len()];
    for (coordinate, value) in values {
        let Coordinate::Series {
            variant, generation, ..
        } = coordinate
        else {
            continue;
        };
        let Some(v) = variants.iter().position(|x| x.name == variant) else {
            continue;
        };
        let Some(g) = generations.iter().position(|&x| x == generation) else {
            continue;
        };
        buckets[v][g].push(value);
    }
    let series = variants
        .iter()
        .zip(buckets)
        .map(|(variant, cells)| Series {
            variant: variant.name.clone(),
            cells: cells.into_iter().map(Cell::from_values).collect(),
        })
        .collect();
    SummarySeries {
        generations,
        series,
        expected_trials,
        failures,
    }
}

/// Mean per mutation rate × population size cell.
pub fn grid(spec: &SweepSpec, axes: &GridAxes, reader: &impl ReadStats) -> SummaryGrid {
    let mutation_rates = axes.mutation.values();
    let population_sizes = axes.size.values();
    let coordinates = SweepKind::grid(spec.clone(), *axes).coordinates();
    let (values, failures) = read_all(coordinates, reader);

    let mut buckets = vec![vec![vec![]; population_sizes.len()]; mutation_rates.len()];
    for (coordinate, value) in values {
        let Coordinate::Grid { mutation, size, .. } = coordinate else {
            continue;
        };
        let Some(row) = mutation_rates.iter().position(|&x| x == mutation) else {
            continue;
        };
        let Some(column) = population_sizes.iter().position(|&x| x == size) else {
            continue;
        };
        buckets[row][column].push(value);
    }
    SummaryGrid {
        mutation_rates,
        population_sizes,
        cells: buckets
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from_values).collect())
            .collect(),
        expected_trials: spec.trials,
        failures,
    }
}

/// Every trial's final value.
pub fn distribution(spec: &SweepSpec, reader: &impl ReadStats) -> SummaryDistribution {
    let coordinates = SweepKind::distribution(spec.clone()).coordinates();
    let (values, failures) = read_all(coordinates, reader);
    let samples: Vec<Sample> = values
        .into_iter()
        .map(|(coordinate, value)| Sample {
            trial: coordinate.trial(),
            value,
        })
        .collect();
    SummaryDistribution {
        overall: Cell::from_values(samples.iter().map(|sample| sample.value).collect()),
        samples,
        expected_trials: spec.trials,
        failures,
    }
}
