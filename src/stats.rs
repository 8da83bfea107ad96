//! Reads the statistics files which the engine exports.
//!
//! A stats file is a JSON object. This crate only cares about one number in
//! it, located by a [KeyPath] which defaults to `fitness.median`. All other
//! fields are ignored.

use crate::error::{Error, Result};
use crate::naming::{Coordinate, StatsLayout};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Dotted path to a number inside a stats file, for example `fitness.median`.
///
/// Segments which are integers also index into arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl Default for KeyPath {
    fn default() -> Self {
        KeyPath(vec!["fitness".to_string(), "median".to_string()])
    }
}

impl FromStr for KeyPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = s.trim().split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(format!("bad key path \"{s}\", expected dot separated names"));
        }
        Ok(KeyPath(segments))
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl Serialize for KeyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl KeyPath {
    /// Find the value at this path, if it exists.
    pub fn lookup<'a>(&self, document: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.0.iter().try_fold(document, |node, segment| match node {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(list) => list.get(segment.parse::<usize>().ok()?),
            _ => None,
        })
    }
}

/// The statistic extracted from one exported file.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub path: PathBuf,
    pub key: KeyPath,
    /// The number found at the key. Integers in the file are widened to f64.
    pub value: f64,
}

/// Read one stats file and extract the number at `key`.
pub fn read_stat(path: impl AsRef<Path>, key: &KeyPath) -> Result<StatRecord> {
    let path = path.as_ref();
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingFile { path: path.into() });
        }
        Err(err) => return Err(err.into()),
    };
    let malformed = |reason: String| Error::MalformedStats {
        path: path.into(),
        reason,
    };
    let document: serde_json::Value =
        serde_json::from_slice(&data).map_err(|err| malformed(format!("JSON decode error: {err}")))?;
    let Some(value) = key.lookup(&document) else {
        return Err(malformed(format!("missing key \"{key}\"")));
    };
    let Some(value) = value.as_f64() else {
        return Err(malformed(format!("key \"{key}\" is not a number: {value}")));
    };
    Ok(StatRecord {
        path: path.into(),
        key: key.clone(),
        value,
    })
}

/// Source of stat records, addressed by sweep coordinate.
///
/// Implementations must be safe to call from several threads at once, the
/// aggregator reads coordinates in parallel.
pub trait ReadStats: Sync {
    fn read(&self, coordinate: &Coordinate) -> Result<StatRecord>;
}

/// Reads stats files from a sweep's output directory.
#[derive(Debug, Clone)]
pub struct StatsReader {
    layout: StatsLayout,
    key: KeyPath,
}

impl StatsReader {
    pub fn new(layout: StatsLayout, key: KeyPath) -> Self {
        Self { layout, key }
    }

    pub fn layout(&self) -> &StatsLayout {
        &self.layout
    }

    pub fn key(&self) -> &KeyPath {
        &self.key
    }
}

impl ReadStats for StatsReader {
    fn read(&self, coordinate: &Coordinate) -> Result<StatRecord> {
        read_stat(self.layout.path(coordinate), &self.key)
    }
}
