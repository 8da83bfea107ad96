//! Error types shared by every stage of a sweep.

use std::path::PathBuf;
use std::time::Duration;

/// Error type for reading and writing JSON files.
#[derive(thiserror::Error, Debug)]
pub enum JsonIoError {
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the engine process stopped without a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// The engine exited with a non-zero status code.
    Code(i32),

    /// The engine was terminated by a signal.
    Signal,

    /// The engine ran past its deadline and was killed.
    Timeout(Duration),
}

impl std::fmt::Display for ExitCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCause::Code(code) => write!(f, "exit code {code}"),
            ExitCause::Signal => write!(f, "terminated by signal"),
            ExitCause::Timeout(timeout) => write!(f, "timed out after {timeout:?}"),
        }
    }
}

/// Everything that can go wrong while building, running, reading or reducing a sweep.
///
/// `InvalidSpec` is raised before any side effect. The engine errors abort one
/// engine invocation but leave the files it already exported in place. The
/// file errors are per-coordinate and get recorded in the summaries instead of
/// aborting the reduction.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid sweep: {0}")]
    InvalidSpec(String),

    #[error("failed to launch engine {program:?}: {source}")]
    EngineLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine {program:?} failed: {cause}")]
    EngineExit { program: PathBuf, cause: ExitCause },

    #[error("missing stats file {path:?}")]
    MissingFile { path: PathBuf },

    #[error("malformed stats file {path:?}: {reason}")]
    MalformedStats { path: PathBuf, reason: String },

    #[error("bad configuration file {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: JsonIoError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidSpec(message.into())
    }

    /// True for errors which mean a stats file is absent or unusable, as
    /// opposed to the filesystem itself failing.
    pub fn is_per_coordinate(&self) -> bool {
        matches!(self, Error::MissingFile { .. } | Error::MalformedStats { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_cause_messages() {
        let err = Error::EngineExit {
            program: "engine".into(),
            cause: ExitCause::Code(3),
        };
        assert_eq!(err.to_string(), r#"engine "engine" failed: exit code 3"#);
        let err = Error::EngineExit {
            program: "engine".into(),
            cause: ExitCause::Timeout(Duration::from_millis(1500)),
        };
        assert_eq!(err.to_string(), r#"engine "engine" failed: timed out after 1.5s"#);
    }

    #[test]
    fn per_coordinate() {
        assert!(Error::MissingFile { path: "x".into() }.is_per_coordinate());
        assert!(
            Error::MalformedStats {
                path: "x".into(),
                reason: String::new()
            }
            .is_per_coordinate()
        );
        assert!(!Error::invalid("nope").is_per_coordinate());
    }
}
