//! Cached pool of detached reader threads
//!
//! Reader tasks block on their source and on a full ring, so they need real threads.
//! The pool is unbounded: a job goes to an idle worker when one is waiting and
//! otherwise gets a freshly spawned thread. Idle workers retire after a keep-alive
//! period. Threads are detached, so an idle pool never holds up process exit.

use ferrofs_types::{EngineConfig, Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A queued task and the completion its handle waits on
struct Job {
    task: Task,
    completion: Arc<Completion>,
}

#[derive(Default)]
struct PoolState {
    jobs: VecDeque<Job>,
    idle: usize,
    workers: usize,
}

struct Shared {
    state: Mutex<PoolState>,
    available: Condvar,
    keep_alive: Duration,
    name: String,
    spawned: AtomicUsize,
}

/// Unbounded, cached pool of detached worker threads
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("workers", &state.workers)
            .field("idle", &state.idle)
            .field("queued", &state.jobs.len())
            .finish()
    }
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(name: impl Into<String>, keep_alive: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                keep_alive,
                name: name.into(),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a worker pool from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.worker_name.clone(), config.worker_keep_alive)
    }

    /// Run a job on a pooled thread
    pub fn spawn<F>(&self, job: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (completion, handle) = TaskHandle::new();
        self.submit(Job {
            task: Box::new(job),
            completion,
        })?;
        Ok(handle)
    }

    /// Run a job that borrows from the caller's stack on a pooled thread.
    ///
    /// # Safety
    ///
    /// The caller must not let `'scope` end before [`TaskHandle::join`] has returned
    /// for the returned handle, on every path including unwinding. Leaking the
    /// handle while the job still runs leaves the job with dangling borrows.
    pub(crate) unsafe fn spawn_scoped<'scope, F>(&self, job: F) -> Result<TaskHandle>
    where
        F: FnOnce() + Send + 'scope,
    {
        let (completion, handle) = TaskHandle::new();
        let task: Box<dyn FnOnce() + Send + 'scope> = Box::new(job);
        // SAFETY: the worker drops the task's captures before it signals completion,
        // and the caller keeps every borrow alive until that completion is observed.
        let task: Task = unsafe {
            std::mem::transmute::<Box<dyn FnOnce() + Send + 'scope>, Task>(task)
        };
        self.submit(Job { task, completion })?;
        Ok(handle)
    }

    /// Number of live worker threads
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Number of worker threads waiting for work
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle
    }

    fn submit(&self, job: Job) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.jobs.push_back(job);
        if state.idle >= state.jobs.len() {
            self.shared.available.notify_one();
            return Ok(());
        }

        let id = self.shared.spawned.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.shared.name, id))
            .spawn(move || worker_loop(&shared));

        match spawned {
            // dropping the join handle detaches the thread
            Ok(_) => {
                state.workers += 1;
                debug!(worker = id, workers = state.workers, "spawned worker thread");
                Ok(())
            }
            Err(error) => {
                warn!("failed to spawn worker thread: {}", error);
                state.jobs.pop_back();
                Err(Error::spawn(error))
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

fn worker_loop(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if let Some(Job { task, completion }) = state.jobs.pop_front() {
            drop(state);
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!("worker job panicked");
            }
            // Signal while holding the pool lock: a caller woken by the handle can
            // only submit again once this worker is parked and counted as idle.
            state = shared.state.lock();
            completion.complete();
            continue;
        }

        state.idle += 1;
        let timed_out = shared
            .available
            .wait_for(&mut state, shared.keep_alive)
            .timed_out();
        state.idle -= 1;

        if timed_out && state.jobs.is_empty() {
            state.workers -= 1;
            debug!(workers = state.workers, "retiring idle worker thread");
            return;
        }
    }
}

#[derive(Debug, Default)]
struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    fn complete(&self) {
        *self.done.lock() = true;
        self.signal.notify_all();
    }
}

/// Handle to a job submitted to a [`WorkerPool`]
#[derive(Debug)]
pub struct TaskHandle {
    completion: Arc<Completion>,
}

impl TaskHandle {
    fn new() -> (Arc<Completion>, Self) {
        let completion = Arc::new(Completion::default());
        (Arc::clone(&completion), Self { completion })
    }

    /// Check if the job has run to completion
    pub fn is_finished(&self) -> bool {
        *self.completion.done.lock()
    }

    /// Block until the job has run to completion
    pub fn join(&self) {
        let mut done = self.completion.done.lock();
        while !*done {
            self.completion.signal.wait(&mut done);
        }
    }

    /// Block until the job has completed or `timeout` elapsed; returns `true` if the
    /// job completed
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.completion.done.lock();
        if !*done {
            let _ = self.completion.signal.wait_while_for(&mut done, |done| !*done, timeout);
        }
        *done
    }
}
