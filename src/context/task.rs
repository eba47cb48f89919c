use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::errors::{ContextError, ContextResult};

/// Handle to a database operation running on the context's runtime
///
/// Returned immediately by every [`DatabaseContext`](super::DatabaseContext)
/// call. Awaiting it yields the operation's result; a panic inside the
/// operation resolves to [`ContextError::Worker`]. Dropping the handle does
/// not cancel the operation.
#[must_use = "the operation runs regardless, but its result is lost unless awaited"]
pub struct Task<T> {
    state: TaskState<T>,
}

enum TaskState<T> {
    Spawned(JoinHandle<ContextResult<T>>),
    Ready(Option<ContextResult<T>>),
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn spawn<F>(runtime: &Handle, future: F) -> Self
    where
        F: Future<Output = ContextResult<T>> + Send + 'static,
    {
        Self {
            state: TaskState::Spawned(runtime.spawn(future)),
        }
    }
}

impl<T> Task<T> {
    /// A task that already has its result, e.g. a rejected call after shutdown
    pub(crate) fn ready(result: ContextResult<T>) -> Self {
        Self {
            state: TaskState::Ready(Some(result)),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            TaskState::Spawned(handle) => handle.is_finished(),
            TaskState::Ready(_) => true,
        }
    }
}

// The ready value is moved out, never pinned.
impl<T> Unpin for Task<T> {}

impl<T> Future for Task<T> {
    type Output = ContextResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            TaskState::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(result) => result,
                Err(error) => Err(ContextError::worker(error)),
            }),
            TaskState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(ContextError::operation("task polled after completion"))),
            ),
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("finished", &self.is_finished())
            .finish()
    }
}
