//! Maps sweep coordinates to the files which hold their statistics.
//!
//! The script builder uses this to tell the engine where to export, and the
//! stats reader uses it to find the exported files again.

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// An addressable point within a sweep's parameter space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Coordinate {
    /// A generation checkpoint of one trial of a time-series sweep.
    Series { variant: String, trial: u64, generation: u64 },

    /// One trial of one cell of a mutation rate × population size sweep.
    Grid { mutation: f64, size: u64, trial: u64 },

    /// The final generation of one trial.
    Final { trial: u64 },
}

impl Coordinate {
    pub fn trial(&self) -> u64 {
        match self {
            Coordinate::Series { trial, .. } | Coordinate::Grid { trial, .. } | Coordinate::Final { trial } => *trial,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coordinate::Series {
                variant,
                trial,
                generation,
            } => write!(f, "{variant} trial {trial} generation {generation}"),
            Coordinate::Grid { mutation, size, trial } => {
                write!(f, "trial {trial} size {size} mutation {mutation}%")
            }
            Coordinate::Final { trial } => write!(f, "trial {trial}"),
        }
    }
}

/// The directory that one sweep exports its statistics into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsLayout {
    dir: PathBuf,
}

impl StatsLayout {
    /// Use an existing directory as-is.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().into(),
        }
    }

    /// Create a fresh, uniquely named directory for one sweep under `root`.
    ///
    /// The directory name is the sweep name followed by a UTC timestamp and a
    /// random suffix. Fails if the directory somehow already exists, so that
    /// two sweeps never export into the same place.
    pub fn namespaced(root: impl AsRef<Path>, name: &str) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let dir = root.join(format!("{name}-{}-{}", timestamp(), suffix()));
        std::fs::create_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file name for the given coordinate, without the directory.
    pub fn file_name(coordinate: &Coordinate) -> String {
        match coordinate {
            Coordinate::Series {
                variant,
                trial,
                generation,
            } => format!("{variant}-{trial}-{generation}.json"),
            Coordinate::Grid { mutation, size, trial } => format!("trial-{trial}-size{size}-mut{mutation}.json"),
            Coordinate::Final { trial } => format!("trial-{trial}.json"),
        }
    }

    /// The full path of the stats file for the given coordinate.
    pub fn path(&self, coordinate: &Coordinate) -> PathBuf {
        self.dir.join(Self::file_name(coordinate))
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

fn suffix() -> String {
    use rand::Rng;
    let rng = &mut rand::rng();
    format!("{:08x}", rng.random::<u32>())
}
