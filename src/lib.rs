//! Evo Sweep drives an external evolutionary engine through parameter sweeps
//! and reduces the statistics it exports into summary tables.
//!
//! The engine is a separate program which reads a line oriented command
//! language on its standard input. A sweep is compiled into command scripts
//! ([script]), the engine runs them ([engine]) and writes one JSON stats file
//! per coordinate ([naming]), and the files are read back ([stats]) and
//! averaged over the trials ([aggregate]).

pub mod aggregate;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod script;
mod serde_utils;
pub mod spec;
pub mod stats;
pub mod sweep;

pub use error::{Error, ExitCause, Result};
