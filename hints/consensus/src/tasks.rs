// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Background worker pool with cancellable, shareable task handles.

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use std::{fmt, future::Future, sync::Arc};
use tokio::{
    runtime::Handle,
    task::{AbortHandle, JoinError, JoinHandle},
};

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, derive_more::IsVariant)]
pub enum TaskError {
    #[error("task was cancelled")]
    Cancelled,
    #[error("task panicked")]
    Panicked,
    #[error("task failed: {0}")]
    Failed(String),
}

impl From<JoinError> for TaskError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Panicked
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

/// Runs cryptographic and submission work off the round-processing thread.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
}

impl WorkerPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Pool over the runtime of the calling context.
    ///
    /// # Panics
    /// When called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn spawn<T, F>(&self, future: F) -> WorkerTask<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        WorkerTask::new(
            self.handle
                .spawn(async move { future.await.map_err(TaskError::from) }),
        )
    }

    /// Runs `f` on the blocking pool. A task cancelled before it is first polled
    /// never starts `f`; once started, `f` runs to completion and its result is dropped.
    pub fn spawn_blocking<T, F>(&self, f: F) -> WorkerTask<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        WorkerTask::new(self.handle.spawn(async move {
            tokio::task::spawn_blocking(f)
                .await
                .map_err(TaskError::from)?
                .map_err(TaskError::from)
        }))
    }
}

/// Cloneable handle of a spawned task.
pub struct WorkerTask<T> {
    result: Shared<BoxFuture<'static, TaskResult<T>>>,
    abort: Arc<AbortHandle>,
}

impl<T: Clone + Send + Sync + 'static> WorkerTask<T> {
    fn new(handle: JoinHandle<TaskResult<T>>) -> Self {
        let abort = Arc::new(handle.abort_handle());
        let result = handle
            .map(|joined| joined.unwrap_or_else(|err| Err(err.into())))
            .boxed()
            .shared();
        Self { result, abort }
    }

    /// Result of the task if it has already completed.
    pub fn outcome(&self) -> Option<TaskResult<T>> {
        self.result.clone().now_or_never()
    }

    pub fn join(&self) -> impl Future<Output = TaskResult<T>> + Send + 'static + use<T> {
        self.result.clone()
    }

    /// Blocks the calling thread until the task completes.
    ///
    /// On a runtime worker the worker's queued tasks are handed off for the duration.
    ///
    /// # Panics
    /// When called from a current-thread runtime.
    pub fn wait(&self) -> TaskResult<T> {
        let result = self.result.clone();
        tokio::task::block_in_place(move || futures::executor::block_on(result))
    }

    /// Best-effort cooperative cancellation.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// Type-erased observer of the task status.
    pub fn watch(&self) -> TaskWatch {
        TaskWatch {
            result: self.result.clone().map(|r| r.map(|_| ())).boxed().shared(),
        }
    }
}

impl<T> Clone for WorkerTask<T> {
    fn clone(&self) -> Self {
        Self {
            result: self.result.clone(),
            abort: self.abort.clone(),
        }
    }
}

impl<T> fmt::Debug for WorkerTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerTask")
            .field("finished", &self.abort.is_finished())
            .finish()
    }
}

#[derive(Clone)]
pub struct TaskWatch {
    result: Shared<BoxFuture<'static, TaskResult<()>>>,
}

impl TaskWatch {
    pub fn outcome(&self) -> Option<TaskResult<()>> {
        self.result.clone().now_or_never()
    }

    pub fn join(&self) -> impl Future<Output = TaskResult<()>> + Send + 'static + use<> {
        self.result.clone()
    }
}

impl fmt::Debug for TaskWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatch")
            .field("outcome", &self.result.peek())
            .finish()
    }
}
