//! Error types for stage pipelines and task joins.

use std::sync::Arc;

use crate::task::{TaskId, TaskState};

type BoxedError = Arc<dyn std::error::Error + Send + Sync>;

/// The main error type for pipelines and task sets.
///
/// Errors are cheap to clone: a failed stage hands the same error to every
/// later pull, and a failed task hands it to every reader of its result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A source failed to produce an item
    #[error("Source error: {0}")]
    Source(#[source] BoxedError),

    /// A stage transform failed
    #[error("Transform error: {0}")]
    Transform(#[source] BoxedError),

    /// A consumer failed to process an item
    #[error("Consumer error: {0}")]
    Consumer(#[source] BoxedError),

    /// A task body panicked
    #[error("Task {task} panicked: {message}")]
    TaskPanicked { task: TaskId, message: String },

    /// A task result was read before the task reached a terminal state
    #[error("Task {task} has not finished (state: {state})")]
    TaskNotFinished { task: TaskId, state: TaskState },

    /// A task was started more than once
    #[error("Task {0} was already started")]
    TaskAlreadyStarted(TaskId),

    /// A bounded wait elapsed
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),

    /// Multiple errors occurred (several tasks of one join failed)
    #[error("Multiple errors occurred: {}", format_multiple(.0))]
    Multiple(Vec<Error>),
}

fn format_multiple(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}]", e))
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenience constructors
impl Error {
    /// Create a source error from any error type
    pub fn source_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Source(Arc::new(error))
    }

    /// Create a transform error from any error type
    pub fn transform<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Transform(Arc::new(error))
    }

    /// Create a consumer error from any error type
    pub fn consumer<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Consumer(Arc::new(error))
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Error::Timeout { duration_ms }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Collapse a list of errors: one error stays as is, several become `Multiple`.
    pub fn from_many(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into our Error type
pub trait IntoError<T> {
    fn into_source_error(self) -> Result<T>;
    fn into_transform_error(self) -> Result<T>;
    fn into_consumer_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_source_error(self) -> Result<T> {
        self.map_err(Error::source_error)
    }

    fn into_transform_error(self) -> Result<T> {
        self.map_err(Error::transform)
    }

    fn into_consumer_error(self) -> Result<T> {
        self.map_err(Error::consumer)
    }
}
