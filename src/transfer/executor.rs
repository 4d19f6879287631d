//! # Executor
//!
//! A single worker thread that owns the [`Pipeline`] and runs submitted
//! requests one at a time, in submission order:
//!
//! ```text
//!  submit() ──▶ ┌─────────────────────────┐  pop   ┌────────────────┐
//!  submit() ──▶ │ Deque<Job> (queue_depth)│ ─────▶ │ worker thread  │──▶ serial link
//!               └─────────────────────────┘        │ Pipeline::run  │
//!       ▲              Condvar wakes worker        └────────────────┘
//!       │                                                   │
//!       └──────────── Ticket ◀── completion channel ◀───────┘
//! ```
//!
//! Submission never blocks behind a transfer: the queue lock is held only to
//! push or pop a job. When queued plus running requests already reach
//! `queue_depth`, [`Executor::submit`] fails at once with
//! [`Error::QueueFull`].

use super::config::{Config, MAX_QUEUE_DEPTH};
use super::error::Error;
use super::pipeline::{Pipeline, Report};
use super::progress::ProgressSnapshot;
use super::request::Request;
use super::status::{Context, LastOperation};
use crate::network::Write;
use crate::network::transport::Transport;
use crate::storage::FileSystem;
use core::time::Duration;
use log::{debug, info, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// What the worker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// Requests are waiting and none has started yet.
    Queued,
    Executing,
}

struct Job {
    request: Request,
    done: SyncSender<Result<Report, Error>>,
}

struct Queue {
    jobs: heapless::Deque<Job, MAX_QUEUE_DEPTH>,
    depth: usize,
    active: bool,
    running: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

fn lock(shared: &Shared) -> MutexGuard<'_, Queue> {
    shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on the result of a submitted request.
#[must_use = "a ticket must be waited on to learn the outcome"]
#[derive(Debug)]
pub struct Ticket {
    done: Receiver<Result<Report, Error>>,
    timeout: Duration,
}

impl Ticket {
    /// Waits up to the configured completion timeout.
    pub fn wait(self) -> Result<Report, Error> {
        let timeout = self.timeout;
        self.wait_timeout(timeout)
    }

    /// Waits up to `timeout`. [`Error::WaitTimeout`] means the caller gave
    /// up waiting; the request itself may still be running.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Report, Error> {
        match self.done.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::WaitTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Shutdown),
        }
    }

    /// The result if the request has already finished.
    pub fn try_result(&self) -> Option<Result<Report, Error>> {
        match self.done.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::Shutdown)),
        }
    }
}

/// Runs requests on a dedicated worker thread.
pub struct Executor {
    shared: Arc<Shared>,
    ctx: Arc<Context>,
    completion_timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for Executor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Executor")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Executor {
    /// Moves `pipeline` onto a new worker thread named `bncurl-worker`.
    pub fn spawn<T, S, F>(pipeline: Pipeline<T, S, F>) -> std::io::Result<Self>
    where
        T: Transport + Send + 'static,
        S: Write + Send + 'static,
        F: FileSystem + Send + 'static,
    {
        let config: Config = *pipeline.config();
        let ctx = Arc::clone(pipeline.context());
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: heapless::Deque::new(),
                depth: config.queue_depth.clamp(1, MAX_QUEUE_DEPTH),
                active: false,
                running: true,
            }),
            ready: Condvar::new(),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("bncurl-worker".into())
                .spawn(move || work(&shared, pipeline))?
        };
        info!("executor started, queue depth {}", config.queue_depth);
        Ok(Self {
            shared,
            ctx,
            completion_timeout: config.completion_timeout(),
            worker: Some(worker),
        })
    }

    /// Queues `request` behind the ones already submitted.
    pub fn submit(&self, request: Request) -> Result<Ticket, Error> {
        let (done, rx) = mpsc::sync_channel(1);
        {
            let mut queue = lock(&self.shared);
            if !queue.running {
                return Err(Error::Shutdown);
            }
            if queue.jobs.len() + usize::from(queue.active) >= queue.depth {
                debug!("queue full, rejecting {}", request.url());
                return Err(Error::QueueFull);
            }
            queue
                .jobs
                .push_back(Job { request, done })
                .map_err(|_| Error::QueueFull)?;
        }
        self.shared.ready.notify_one();
        Ok(Ticket {
            done: rx,
            timeout: self.completion_timeout,
        })
    }

    /// Submits `request` and waits for its outcome.
    pub fn execute(&self, request: Request) -> Result<Report, Error> {
        self.submit(request)?.wait()
    }

    pub fn state(&self) -> State {
        let queue = lock(&self.shared);
        if queue.active {
            State::Executing
        } else if !queue.jobs.is_empty() {
            State::Queued
        } else {
            State::Idle
        }
    }

    /// Queued plus running requests.
    pub fn pending(&self) -> usize {
        let queue = lock(&self.shared);
        queue.jobs.len() + usize::from(queue.active)
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Progress of the running request, if any.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        self.ctx.progress()
    }

    pub fn last_operation(&self) -> Option<LastOperation> {
        self.ctx.last_operation()
    }

    /// Asks the running request to stop. Returns `false` when idle.
    pub fn stop(&self) -> bool {
        self.ctx.stop()
    }

    /// Drops queued requests, stops the running one and joins the worker.
    /// Outstanding tickets resolve to [`Error::Shutdown`] (or to the
    /// running request's own outcome).
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let dropped = {
            let mut queue = lock(&self.shared);
            queue.running = false;
            let dropped = queue.jobs.len();
            queue.jobs.clear();
            dropped
        };
        if dropped > 0 {
            warn!("shutdown dropped {} queued request(s)", dropped);
        }
        // a job popped but not yet begun still sees the stop
        self.ctx.close();
        self.shared.ready.notify_all();
        if worker.join().is_err() {
            warn!("worker thread panicked");
        }
        self.ctx.reset();
        info!("executor stopped");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.close();
    }
}

fn next_job(shared: &Shared) -> Option<Job> {
    let mut queue = lock(shared);
    loop {
        if !queue.running {
            return None;
        }
        if let Some(job) = queue.jobs.pop_front() {
            queue.active = true;
            return Some(job);
        }
        queue = shared
            .ready
            .wait(queue)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn work<T, S, F>(shared: &Shared, mut pipeline: Pipeline<T, S, F>)
where
    T: Transport,
    S: Write,
    F: FileSystem,
{
    debug!("worker running");
    while let Some(job) = next_job(shared) {
        let result = pipeline.run(&job.request);
        lock(shared).active = false;
        // the submitter may have stopped waiting
        let _ = job.done.send(result);
    }
    debug!("worker exiting");
}
