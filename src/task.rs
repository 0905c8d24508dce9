//! Tasks: independently scheduled units of work with an explicit lifecycle.
//!
//! ```text
//! Pending --start()--> Running --Ok--------> Done
//!                              --Err/panic--> Failed
//! ```
//!
//! Done and Failed are terminal. A task's failure is captured at its own
//! boundary and only surfaces when its result is read. Once started, a task
//! always runs to completion: dropping the handle or giving up on a wait
//! does not stop it.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

/// Unique identifier for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TaskState {
    /// Created but not started
    Pending,
    /// Started and not yet finished
    Running,
    /// Finished with a value
    Done,
    /// Finished with an error or a panic
    Failed,
}

impl TaskState {
    /// Whether the state is Done or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Body and state publisher, held until the task is started.
struct Unstarted<T> {
    body: BoxFuture<'static, Result<T>>,
    state: watch::Sender<TaskState>,
}

/// Handle to a unit of work.
///
/// The handle observes the task's state and, once terminal, its outcome. The
/// outcome can be read any number of times.
pub struct Task<T> {
    id: TaskId,
    name: Option<String>,
    state: watch::Receiver<TaskState>,
    outcome: Arc<OnceLock<Result<T>>>,
    unstarted: Option<Unstarted<T>>,
}

impl<T: Send + Sync + 'static> Task<T> {
    /// Create a task in the Pending state; nothing runs until [`Task::start`].
    pub fn new<F>(id: TaskId, body: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(TaskState::Pending);
        Self {
            id,
            name: None,
            state: rx,
            outcome: Arc::new(OnceLock::new()),
            unstarted: Some(Unstarted {
                body: body.boxed(),
                state: tx,
            }),
        }
    }

    /// Attach a name used in logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Move the task to Running and schedule it on the tokio runtime.
    ///
    /// Returns immediately. Starting a task twice is an error.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        let Unstarted { body, state } = self
            .unstarted
            .take()
            .ok_or(Error::TaskAlreadyStarted(self.id))?;

        let id = self.id;
        let outcome = self.outcome.clone();
        state.send_replace(TaskState::Running);
        debug!(task = %id, name = self.name.as_deref(), "task started");

        tokio::spawn(async move {
            let result = match AssertUnwindSafe(body).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(Error::TaskPanicked {
                    task: id,
                    message: panic_message(payload.as_ref()),
                }),
            };

            let terminal = if result.is_ok() {
                TaskState::Done
            } else {
                TaskState::Failed
            };
            // The outcome is stored before the state flips, so any observer
            // of a terminal state can read it.
            let _ = outcome.set(result);
            state.send_replace(terminal);

            debug!(task = %id, state = %terminal, "task finished");
            #[cfg(feature = "metrics")]
            crate::metrics::record_task_finished(terminal);
        });

        Ok(())
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Suspend until the task reaches Done or Failed.
    ///
    /// The returned future does not borrow the handle. It resolves at once
    /// for a Pending task that was never started, since nothing would ever
    /// wake the wait.
    pub fn finished(&self) -> impl Future<Output = TaskState> + Send + 'static {
        let started = self.unstarted.is_none();
        let mut state = self.state.clone();

        async move {
            if !started {
                return TaskState::Pending;
            }
            // An error means the publisher is gone without reaching a
            // terminal state: the runtime dropped the task.
            if state.wait_for(TaskState::is_terminal).await.is_err() {
                debug!("task dropped before finishing");
            }
            let settled = *state.borrow();
            settled
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Task<T> {
    /// Read the result without waiting.
    ///
    /// Reading before the task is terminal is a contract violation and
    /// returns [`Error::TaskNotFinished`]. A Failed task returns its captured
    /// error every time.
    pub fn result(&self) -> Result<T> {
        match self.outcome.get() {
            Some(outcome) => outcome.clone(),
            None => Err(Error::TaskNotFinished {
                task: self.id,
                state: self.state(),
            }),
        }
    }

    /// Wait for the task to finish, then read its result.
    pub async fn wait(&self) -> Result<T> {
        self.finished().await;
        self.result()
    }

    /// Like [`Task::wait`], but give up after `timeout`.
    ///
    /// Only the caller's wait is bounded; the task keeps running.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.finished()).await {
            Ok(_) => self.result(),
            Err(_) => Err(Error::timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Create and immediately start a task.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub fn launch<T, F>(id: TaskId, body: F) -> Task<T>
where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let mut task = Task::new(id, body);
    // A fresh task has its body, so starting cannot fail.
    let _ = task.start();
    task
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
