//! Background rebuilds with generation gating
//!
//! Each submitted job gets a generation number. A job finishing after a newer
//! one was submitted is dropped, so an out-of-date result can never replace a
//! newer one. Jobs are pure, so superseded work is simply abandoned.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::EngineError;

pub struct BackgroundJobs<T> {
    name: &'static str,
    generation: Arc<AtomicU64>,
    applied: u64,
    tx: Sender<(u64, T)>,
    rx: Receiver<(u64, T)>,
}

impl<T: Send + 'static> BackgroundJobs<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = unbounded();
        Self {
            name,
            generation: Arc::new(AtomicU64::new(0)),
            applied: 0,
            tx,
            rx,
        }
    }

    /// Start `job` on a worker thread, superseding anything in flight
    pub fn submit<F>(&self, job: F) -> Result<u64, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let tx = self.tx.clone();
        let name = self.name;

        thread::Builder::new()
            .name(format!("calm-{name}"))
            .spawn(move || {
                let result = job();
                if latest.load(Ordering::SeqCst) != generation {
                    debug!(job = name, generation, "superseded before completion");
                    return;
                }
                // Receiver gone means the owner was dropped
                let _ = tx.send((generation, result));
            })?;

        debug!(job = name, generation, "rebuild submitted");
        Ok(generation)
    }

    /// Newest result of the current generation, if one has arrived
    pub fn poll(&mut self) -> Option<T> {
        let mut newest = None;
        while let Ok((generation, result)) = self.rx.try_recv() {
            if let Some(result) = self.accept(generation, result) {
                newest = Some(result);
            }
        }
        newest
    }

    /// Block until the current generation's result arrives or `timeout` passes
    pub fn wait(&mut self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok((generation, result)) => {
                    if let Some(result) = self.accept(generation, result) {
                        return Some(result);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&mut self, generation: u64, result: T) -> Option<T> {
        let current = self.generation.load(Ordering::SeqCst);
        if generation != current || generation <= self.applied {
            debug!(job = self.name, generation, current, "stale rebuild discarded");
            return None;
        }
        self.applied = generation;
        Some(result)
    }

    /// Latest submitted generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether the latest submission has not been applied yet
    pub fn is_pending(&self) -> bool {
        self.generation() > self.applied
    }
}
