//! Single-consumer work queue owning a state value.
//!
//! [`SerialQueue`] spawns a named worker thread that owns `S` exclusively.
//! Work items are closures receiving `&mut S`; they run one at a time in
//! arrival order and always run to completion. A work item may submit more
//! work through a [`QueueHandle`]; it is scheduled after the current item.
//!
//! Delayed items (`submit_after`) are kept in a timer heap on the worker and
//! run once their deadline passes, interleaved with regular submissions.
//! They are counted by [`QueueHandle::scheduled`], not by
//! [`QueueHandle::pending`].

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur when submitting work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue {0} is closed")]
    Closed(String),
    #[error("failed to spawn worker for queue {0}: {1}")]
    Spawn(String, String),
}

type Work<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Message<S> {
    Run(Work<S>),
    RunAt(Instant, Work<S>),
    Shutdown,
}

struct Timer<S> {
    due: Instant,
    sequence: u64,
    work: Work<S>,
}

impl<S> PartialEq for Timer<S> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl<S> Eq for Timer<S> {}

impl<S> PartialOrd for Timer<S> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for Timer<S> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.due, self.sequence).cmp(&(other.due, other.sequence))
    }
}

/// Cloneable submission handle for a [`SerialQueue`].
pub struct QueueHandle<S> {
    tx: Sender<Message<S>>,
    label: Arc<str>,
    worker: Arc<OnceLock<ThreadId>>,
    pending: Arc<AtomicUsize>,
    scheduled: Arc<AtomicUsize>,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            label: Arc::clone(&self.label),
            worker: Arc::clone(&self.worker),
            pending: Arc::clone(&self.pending),
            scheduled: Arc::clone(&self.scheduled),
        }
    }
}

impl<S> std::fmt::Debug for QueueHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("label", &self.label)
            .field("pending", &self.pending())
            .field("scheduled", &self.scheduled())
            .finish()
    }
}

impl<S: 'static> QueueHandle<S> {
    /// Appends `work` to the queue.
    pub fn submit<F>(&self, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Message::Run(Box::new(work)), &self.pending)
    }

    /// Runs `work` on the queue once `delay` has elapsed.
    pub fn submit_after<F>(&self, delay: Duration, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(
            Message::RunAt(Instant::now() + delay, Box::new(work)),
            &self.scheduled,
        )
    }

    fn send(&self, message: Message<S>, counter: &AtomicUsize) -> Result<(), QueueError> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.tx.send(message).map_err(|_| {
            counter.fetch_sub(1, Ordering::SeqCst);
            QueueError::Closed(self.label.to_string())
        })
    }
}

impl<S> QueueHandle<S> {
    /// Returns true when called from the queue's worker thread.
    pub fn is_current(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }

    /// Work items submitted but not yet finished. Timers are excluded until
    /// they come due.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Delayed work items whose deadline has not been reached.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A dedicated worker thread executing work items against owned state.
pub struct SerialQueue<S> {
    handle: QueueHandle<S>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: 'static> SerialQueue<S> {
    /// Spawns the worker. `init` runs on the worker and builds the state,
    /// receiving a handle it may keep for reentrant submissions.
    pub fn spawn<F>(label: impl Into<String>, init: F) -> Result<Self, QueueError>
    where
        F: FnOnce(QueueHandle<S>) -> S + Send + 'static,
    {
        let label: Arc<str> = Arc::from(label.into());
        let (tx, rx) = unbounded();
        let handle = QueueHandle {
            tx,
            label: Arc::clone(&label),
            worker: Arc::new(OnceLock::new()),
            pending: Arc::new(AtomicUsize::new(0)),
            scheduled: Arc::new(AtomicUsize::new(0)),
        };

        let worker_handle = handle.clone();
        let join = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let _ = worker_handle.worker.set(thread::current().id());
                let counters = Counters {
                    pending: Arc::clone(&worker_handle.pending),
                    scheduled: Arc::clone(&worker_handle.scheduled),
                };
                let label = Arc::clone(&worker_handle.label);
                let state = init(worker_handle);
                run_worker(rx, state, &label, &counters);
            })
            .map_err(|e| QueueError::Spawn(label.to_string(), e.to_string()))?;

        tracing::debug!(queue = %label, "Session queue started");

        Ok(Self {
            handle,
            worker: Mutex::new(Some(join)),
        })
    }

    pub fn submit<F>(&self, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.handle.submit(work)
    }

    pub fn submit_after<F>(&self, delay: Duration, work: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.handle.submit_after(delay, work)
    }

    /// Returns a new submission handle.
    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    pub fn is_current(&self) -> bool {
        self.handle.is_current()
    }

    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    pub fn scheduled(&self) -> usize {
        self.handle.scheduled()
    }

    /// Runs everything already queued, then stops the worker.
    ///
    /// Pending timers are dropped. Joins the worker unless called from it.
    pub fn shutdown(&self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if self.handle.is_current() {
            return;
        }
        if let Some(join) = self.worker.lock().take() {
            if join.join().is_err() {
                tracing::error!(queue = %self.handle.label, "Session queue worker panicked");
            }
        }
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if self.handle.is_current() {
            return;
        }
        if let Some(join) = self.worker.get_mut().take() {
            let _ = join.join();
        }
    }
}

struct Counters {
    pending: Arc<AtomicUsize>,
    scheduled: Arc<AtomicUsize>,
}

fn run_worker<S>(rx: Receiver<Message<S>>, mut state: S, label: &str, counters: &Counters) {
    let mut timers: BinaryHeap<Reverse<Timer<S>>> = BinaryHeap::new();
    let mut sequence = 0u64;

    loop {
        let now = Instant::now();
        while timers.peek().is_some_and(|Reverse(timer)| timer.due <= now) {
            if let Some(Reverse(timer)) = timers.pop() {
                counters.scheduled.fetch_sub(1, Ordering::SeqCst);
                counters.pending.fetch_add(1, Ordering::SeqCst);
                execute(&mut state, timer.work, label, &counters.pending);
            }
        }

        let message = match timers.peek() {
            Some(Reverse(timer)) => match rx.recv_deadline(timer.due) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Run(work) => execute(&mut state, work, label, &counters.pending),
            Message::RunAt(due, work) => {
                sequence += 1;
                timers.push(Reverse(Timer {
                    due,
                    sequence,
                    work,
                }));
            }
            Message::Shutdown => break,
        }
    }

    counters.pending.store(0, Ordering::SeqCst);
    counters.scheduled.store(0, Ordering::SeqCst);
    tracing::debug!(
        queue = %label,
        dropped_timers = timers.len(),
        "Session queue stopped"
    );
}

fn execute<S>(state: &mut S, work: Work<S>, label: &str, pending: &AtomicUsize) {
    if catch_unwind(AssertUnwindSafe(|| work(state))).is_err() {
        tracing::error!(queue = %label, "Work item panicked; continuing with next item");
    }
    pending.fetch_sub(1, Ordering::SeqCst);
}
