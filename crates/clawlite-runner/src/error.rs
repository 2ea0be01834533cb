use clawlite_core::group::GroupFolderError;
use std::path::Path;

/// Errors raised before a worker is spawned, or by host-side helpers.
///
/// Worker failures themselves are never errors: they resolve as
/// `WorkerOutput { status: Error, .. }`.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    InvalidGroupFolder(#[from] GroupFolderError),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn create_dir_error(path: &Path, source: std::io::Error) -> RunnerError {
    RunnerError::CreateDir {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn read_error(path: &Path, source: std::io::Error) -> RunnerError {
    RunnerError::Read {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn write_error(path: &Path, source: std::io::Error) -> RunnerError {
    RunnerError::Write {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn copy_error(from: &Path, to: &Path, source: std::io::Error) -> RunnerError {
    RunnerError::Copy {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    }
}
