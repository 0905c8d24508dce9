//! Fan-out and barrier-join over a fixed set of tasks.
//!
//! Every task in a [`TaskSet`] is started before the join waits on any of
//! them, so the members run concurrently instead of one after another. The
//! join is the only synchronization point; a failed member never affects its
//! siblings or the join itself.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{launch, Task, TaskId, TaskState};

/// Partition of a task set at the moment a join returned.
#[derive(Debug)]
pub struct JoinResult<T> {
    /// Tasks that reached Done or Failed, in the order they finished
    pub done: Vec<Task<T>>,
    /// Tasks still running when a bounded join gave up
    pub pending: Vec<Task<T>>,
}

impl<T: Clone + Send + Sync + 'static> JoinResult<T> {
    /// Whether every task finished
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Results of the finished tasks, paired with their ids
    pub fn results(&self) -> Vec<(TaskId, Result<T>)> {
        self.done.iter().map(|t| (t.id(), t.result())).collect()
    }

    /// Values of every finished task, ordered by task id.
    ///
    /// Fails with the single failure, or with [`Error::Multiple`] if several
    /// tasks failed. Tasks still pending are ignored.
    pub fn try_collect(&self) -> Result<Vec<T>> {
        let mut results = self.results();
        results.sort_by_key(|(id, _)| *id);

        let mut values = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (_, result) in results {
            match result {
                Ok(value) => values.push(value),
                Err(e) => errors.push(e),
            }
        }

        match Error::from_many(errors) {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

impl<T> JoinResult<T> {
    pub fn into_parts(self) -> (Vec<Task<T>>, Vec<Task<T>>) {
        (self.done, self.pending)
    }
}

/// A fixed collection of tasks created together.
pub struct TaskSet<T> {
    tasks: Vec<Task<T>>,
    next_id: u64,
}

impl<T: Send + Sync + 'static> TaskSet<T> {
    /// Create an empty task set
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start a task right away and add it to the set.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn launch<F>(&mut self, body: F) -> TaskId
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let id = self.allocate_id();
        self.tasks.push(launch(id, body));
        id
    }

    /// Like [`TaskSet::launch`], with a name for logs
    pub fn launch_named<F>(&mut self, name: impl Into<String>, body: F) -> TaskId
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let id = self.allocate_id();
        let mut task = Task::new(id, body).named(name);
        // Fresh task, so starting cannot fail
        let _ = task.start();
        self.tasks.push(task);
        id
    }

    /// Add an existing task, started or not.
    ///
    /// Pending tasks are started by [`TaskSet::join_all`] before it waits.
    pub fn push(&mut self, task: Task<T>) {
        self.next_id = self.next_id.max(task.id().0.saturating_add(1));
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Current state of every task, in insertion order
    pub fn states(&self) -> Vec<(TaskId, TaskState)> {
        self.tasks.iter().map(|t| (t.id(), t.state())).collect()
    }

    /// Wait for the set, see [`join_all`].
    pub async fn join_all(self, timeout: Option<Duration>) -> JoinResult<T> {
        join_all(self.tasks, timeout).await
    }
}

impl<T: Send + Sync + 'static> Default for TaskSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> FromIterator<Task<T>> for TaskSet<T> {
    fn from_iter<I: IntoIterator<Item = Task<T>>>(iter: I) -> Self {
        let mut set = TaskSet::new();
        for task in iter {
            set.push(task);
        }
        set
    }
}

/// Start every pending task, then wait for all of them.
///
/// With `timeout` of `None` this is a full barrier and the returned
/// `pending` partition is empty. With a timeout, it returns once the
/// deadline passes with whatever finished by then; tasks left in `pending`
/// keep running.
pub async fn join_all<T>(mut tasks: Vec<Task<T>>, timeout: Option<Duration>) -> JoinResult<T>
where
    T: Send + Sync + 'static,
{
    for task in tasks.iter_mut().filter(|t| t.state() == TaskState::Pending) {
        if let Err(e) = task.start() {
            warn!(task = %task.id(), error = %e, "task could not be started");
        }
    }
    debug!(tasks = tasks.len(), ?timeout, "joining tasks");

    let mut waits: FuturesUnordered<_> = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let finished = task.finished();
            async move {
                finished.await;
                index
            }
        })
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    let drain = async {
        while let Some(index) = waits.next().await {
            order.push(index);
        }
    };
    match timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, drain).await.is_err() {
                debug!("join deadline passed");
            }
        }
        None => drain.await,
    }

    let mut slots: Vec<Option<Task<T>>> = tasks.into_iter().map(Some).collect();
    let done: Vec<Task<T>> = order.iter().filter_map(|&i| slots[i].take()).collect();
    let pending: Vec<Task<T>> = slots.into_iter().flatten().collect();

    debug!(done = done.len(), pending = pending.len(), "join returned");
    JoinResult { done, pending }
}
