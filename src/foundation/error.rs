use std::path::PathBuf;

/// Crate-wide result alias.
pub type V2dResult<T> = Result<T, V2dError>;

/// Errors surfaced by job assembly, submission, and fence synchronization.
#[derive(thiserror::Error, Debug)]
pub enum V2dError {
    /// Task storage could not be allocated.
    ///
    /// Never returned to a caller: it only describes the diagnostic printed right before the
    /// process aborts.
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// The job handle is the null sentinel, already ended, or was never issued.
    #[error("invalid job handle")]
    InvalidHandle,

    /// The job already holds the maximum number of tasks.
    #[error("job capacity exceeded: a job holds at most {max} tasks")]
    CapacityExceeded {
        /// Per-job task limit.
        max: usize,
    },

    /// The device node could not be opened.
    #[error("device '{}' unavailable: {source}", path.display())]
    DeviceUnavailable {
        /// Device node path.
        path: PathBuf,
        /// Error returned by `open`.
        source: std::io::Error,
    },

    /// The kernel accepted fewer bytes than one full task record.
    #[error("short write on task {index}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Position of the task inside its job.
        index: usize,
        /// Bytes accepted by the device.
        written: usize,
        /// Size of one task record.
        expected: usize,
    },

    /// The write call for a task record failed outright.
    #[error("write of task {index} rejected: {source}")]
    DeviceWrite {
        /// Position of the task inside its job.
        index: usize,
        /// Error returned by `write`.
        source: std::io::Error,
    },

    /// A completion fence did not signal within the timeout.
    #[error("fence of task {index} timed out after {timeout_ms} ms")]
    FenceTimeout {
        /// Position of the task inside its job.
        index: usize,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// A completion fence reported an error condition.
    #[error("fence of task {index} reported an error: {detail}")]
    FencePollError {
        /// Position of the task inside its job.
        index: usize,
        /// What `poll` reported.
        detail: String,
    },

    /// Caller input rejected before any device I/O.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    /// Error raised by a custom device provider.
    Other(#[from] anyhow::Error),
}

impl V2dError {
    /// Build a [`V2dError::AllocationFailure`] value.
    pub fn allocation_failure(msg: impl Into<String>) -> Self {
        Self::AllocationFailure(msg.into())
    }

    /// Build a [`V2dError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`V2dError::FencePollError`] value.
    pub fn fence_poll(index: usize, detail: impl Into<String>) -> Self {
        Self::FencePollError {
            index,
            detail: detail.into(),
        }
    }

    /// Return `true` for failures raised while waiting on completion fences.
    pub fn is_fence_failure(&self) -> bool {
        matches!(self, Self::FenceTimeout { .. } | Self::FencePollError { .. })
    }

    /// Return `true` for failures that stopped submission partway through a job.
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, Self::ShortWrite { .. } | Self::DeviceWrite { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
