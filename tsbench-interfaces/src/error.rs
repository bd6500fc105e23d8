//! Error type shared by every stage of a load run

use thiserror::Error;
use tsbench_resilience::{RetryError, Retryable};

/// Result alias used across the load pipeline
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised while reading, batching or sending points
#[derive(Error, Debug)]
pub enum LoadError {
    /// The backend asked the client to back off and resend later
    #[error("backend requested backoff")]
    Backpressure,

    /// Malformed input
    #[error("parse error: {0}")]
    Parse(String),

    /// The backend rejected a batch or could not be reached
    #[error("send error: {0}")]
    Send(String),

    /// Database creation or removal failed
    #[error("database setup error: {0}")]
    Setup(String),

    /// The run was configured inconsistently
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker failed; wraps the error it hit
    #[error("worker {worker}: {source}")]
    Worker {
        worker: usize,
        #[source]
        source: Box<LoadError>,
    },

    /// The run was cancelled before the batch could be delivered
    #[error("run cancelled")]
    Cancelled,

    /// A task panicked or was torn down unexpectedly
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoadError {
    /// Build a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        LoadError::Parse(message.into())
    }

    /// Build a send error
    pub fn send(message: impl Into<String>) -> Self {
        LoadError::Send(message.into())
    }

    /// Build a database setup error
    pub fn setup(message: impl Into<String>) -> Self {
        LoadError::Setup(message.into())
    }

    /// Attribute an error to a worker
    pub fn in_worker(self, worker: usize) -> Self {
        match self {
            already @ LoadError::Worker { .. } => already,
            other => LoadError::Worker {
                worker,
                source: Box::new(other),
            },
        }
    }

    /// Whether this is the backpressure sentinel
    pub fn is_backpressure(&self) -> bool {
        matches!(self, LoadError::Backpressure)
    }

    /// Whether the error comes from cancelling the run
    pub fn is_cancelled(&self) -> bool {
        match self {
            LoadError::Cancelled => true,
            LoadError::Worker { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Pipeline stage the error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            LoadError::Backpressure | LoadError::Send(_) => "send",
            LoadError::Parse(_) => "parse",
            LoadError::Setup(_) => "setup",
            LoadError::Config(_) => "config",
            LoadError::Io(_) => "io",
            LoadError::Worker { source, .. } => source.stage(),
            LoadError::Cancelled => "cancel",
            LoadError::Internal(_) => "internal",
        }
    }
}

impl Retryable for LoadError {
    fn is_retryable(&self) -> bool {
        self.is_backpressure()
    }
}

impl From<RetryError<LoadError>> for LoadError {
    fn from(error: RetryError<LoadError>) -> Self {
        match error {
            RetryError::MaxAttemptsExceeded { attempts, last_error } => {
                LoadError::Send(format!("gave up after {} attempts: {}", attempts, last_error))
            }
            RetryError::NonRetryableError(error) => error,
            RetryError::Cancelled { .. } => LoadError::Cancelled,
        }
    }
}
