//! Error types for dayboard-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskId;

/// Failure to read a time-of-day out of a template timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The time portion parsed neither as `HH:MM:SS` nor as `HH:MM`.
    #[error("malformed time of day in template timestamp '{input}'")]
    MalformedTimeOfDay { input: String },
}

/// Errors raised while validating values at the domain boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A date string that is not `YYYY-MM-DD`.
    #[error("invalid date '{input}'; expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

/// All errors that can arise from status store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse store document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A status write referenced a task id with no template.
    #[error("task {0} not exists")]
    UnknownTask(TaskId),

    /// A stored template carries a start/end time that cannot be projected.
    #[error("template {id} is malformed: {source}")]
    Template {
        id: TaskId,
        #[source]
        source: ProjectionError,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors loading `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("utc_offset_minutes {0} is out of range")]
    InvalidOffset(i32),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
