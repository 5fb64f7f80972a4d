// src/scheduler.rs - Rate-limited background inference with generation tagging
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::TrackerError;

/// Monotonic per-job tag; higher is newer.
pub type Generation = u64;

#[derive(Debug)]
pub struct Completion<T> {
    pub generation: Generation,
    pub output: T,
}

/// Single-entry mailbox holding the newest finished job.
struct Slot<T> {
    latest: Option<Completion<T>>,
    last_taken: Option<Generation>,
    stale: u64,
    producers: usize,
}

impl<T> Slot<T> {
    fn offer(&mut self, completion: Completion<T>) -> bool {
        let newest = self.latest.as_ref().map(|c| c.generation).max(self.last_taken);
        if newest.is_some_and(|g| completion.generation <= g) {
            self.stale += 1;
            debug!(generation = completion.generation, ?newest, "dropping stale completion");
            return false;
        }
        if let Some(replaced) = self.latest.replace(completion) {
            self.stale += 1;
            debug!(generation = replaced.generation, "completion superseded before it was applied");
        }
        true
    }

    fn take(&mut self) -> Option<Completion<T>> {
        let completion = self.latest.take()?;
        self.last_taken = Some(completion.generation);
        Some(completion)
    }
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Weak handle into the queue. Once the queue is dropped every publish is a
/// no-op.
struct Producer<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Producer<T> {
    fn register(shared: &Weak<Shared<T>>) -> Self {
        if let Some(s) = shared.upgrade() {
            s.lock().producers += 1;
        }
        Self {
            shared: shared.clone(),
        }
    }

    fn publish(&self, completion: Completion<T>) {
        let Some(shared) = self.shared.upgrade() else {
            debug!(generation = completion.generation, "owner gone, completion discarded");
            return;
        };
        if shared.lock().offer(completion) {
            shared.ready.notify_one();
        }
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut slot = shared.lock();
            slot.producers = slot.producers.saturating_sub(1);
            drop(slot);
            shared.ready.notify_one();
        }
    }
}

/// Gates and dispatches per-frame work onto the runtime's blocking pool.
///
/// Results come back through the paired [`CompletionQueue`], which keeps only
/// the newest one. Dropping the queue turns any in-flight result into a no-op.
pub struct InferenceScheduler<T> {
    min_interval: Duration,
    last_run: Option<Instant>,
    next_generation: Generation,
    runtime: Handle,
    producer: Producer<T>,
    skipped: Arc<AtomicU64>,
}

pub struct CompletionQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> InferenceScheduler<T> {
    pub fn new(min_interval: Duration, runtime: Handle) -> (Self, CompletionQueue<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                latest: None,
                last_taken: None,
                stale: 0,
                producers: 0,
            }),
            ready: Notify::new(),
        });
        let scheduler = Self {
            min_interval,
            last_run: None,
            next_generation: 1,
            runtime,
            producer: Producer::register(&Arc::downgrade(&shared)),
            skipped: Arc::new(AtomicU64::new(0)),
        };
        (scheduler, CompletionQueue { shared })
    }

    /// True when enough time passed since the last accepted run. A `true`
    /// answer records `now` as the new last run.
    pub fn should_infer(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_run {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_run = Some(now);
        true
    }

    /// Runs `job` off the render path if the gate allows it.
    ///
    /// A job error skips the frame: it is logged and nothing is delivered.
    pub fn submit<F>(&mut self, now: Instant, job: F) -> Option<Generation>
    where
        F: FnOnce() -> Result<T, TrackerError> + Send + 'static,
    {
        if !self.should_infer(now) {
            return None;
        }
        let generation = self.next_generation;
        self.next_generation += 1;

        let producer = Producer::register(&self.producer.shared);
        let skipped = Arc::clone(&self.skipped);
        self.runtime.spawn_blocking(move || match job() {
            Ok(output) => producer.publish(Completion { generation, output }),
            Err(e) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                debug!(generation, error = %e, "frame skipped");
            }
        });
        Some(generation)
    }

    /// Jobs that failed and were dropped.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl<T> CompletionQueue<T> {
    /// Non-blocking: the newest result not yet handed out, if any. Anything
    /// older that finished in between has already been dropped.
    pub fn take_latest(&mut self) -> Option<Completion<T>> {
        self.shared.lock().take()
    }

    /// Waits for the next fresh result; `None` once the scheduler and every
    /// in-flight job are gone.
    pub async fn next_fresh(&mut self) -> Option<Completion<T>> {
        loop {
            {
                let mut slot = self.shared.lock();
                if let Some(completion) = slot.take() {
                    return Some(completion);
                }
                if slot.producers == 0 {
                    return None;
                }
            }
            self.shared.ready.notified().await;
        }
    }

    pub fn last_applied(&self) -> Option<Generation> {
        self.shared.lock().last_taken
    }

    /// Completions discarded because something newer won.
    pub fn stale_dropped(&self) -> u64 {
        self.shared.lock().stale
    }
}
