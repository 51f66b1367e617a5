use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures from running the external metadata tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with status {code:?}")]
    ExitStatus { program: String, code: Option<i32> },

    #[error("{program} produced no output")]
    EmptyOutput { program: String },

    #[error("I/O error while talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Failures of a single metadata extractor
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("metadata tool failed for {path}: {source}")]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("unparsable dimensions {output:?} for {path}")]
    Dimensions { path: PathBuf, output: String },

    #[error("no resolution strategy applies to {path}")]
    NoStrategy { path: PathBuf },
}

/// Fatal errors that stop a whole scan or batch
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("{program} is required (force-tool mode) but is not available")]
    ToolUnavailable { program: String },

    #[error("directory not found or not a directory: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("cannot create destination directory {path}: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("prompt failed: {0}")]
    Prompt(#[from] io::Error),
}
