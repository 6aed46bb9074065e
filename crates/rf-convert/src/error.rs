//! Error types for conversion

use thiserror::Error;

use crate::job::JobId;

/// Conversion errors
///
/// `Format`, `UnsupportedFormat`, `Encode` and `Io` are job-scoped: they end
/// up verbatim in a job's error message. The remaining variants are returned
/// by queue control operations and never change job state.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0}")]
    Format(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A conversion batch is already running")]
    Busy,

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job is converting and cannot be removed: {0}")]
    JobInProgress(JobId),

    #[error("Job has no MP3 output: {0}")]
    NoResult(JobId),
}

impl ConvertError {
    /// True for errors that belong to a single job's conversion
    pub fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::UnsupportedFormat(_) | Self::Encode(_) | Self::Io(_)
        )
    }
}

/// Result type for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;
