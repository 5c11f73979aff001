//! Debounced catalog refresh.
//!
//! Each `schedule` aborts the previous timer and spawns a new task that
//! sleeps for the debounce delay, fetches the listing, and posts the result
//! tagged with its generation. Only an outcome whose generation matches the
//! latest `schedule`/`cancel` call is handed out; anything older is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{CatalogError, Model, fetch_models};
use crate::transport::HttpTransport;

#[derive(Debug)]
pub struct RefreshOutcome {
    pub generation: u64,
    pub result: Result<Vec<Model>, CatalogError>,
}

pub struct RefreshScheduler {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<RefreshOutcome>,
    rx: mpsc::UnboundedReceiver<RefreshOutcome>,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { delay, generation: 0, pending: None, tx, rx }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` while a timer or its fetch is still running.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Restart the timer. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, transport: Arc<dyn HttpTransport>, base_url: String, api_key: String) -> u64 {
        self.cancel();
        let generation = self.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        debug!(generation, ?delay, "catalog: refresh scheduled");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = fetch_models(transport.as_ref(), &base_url, &api_key).await;
            // The receiver lives as long as the scheduler; a send error means it was dropped.
            let _ = tx.send(RefreshOutcome { generation, result });
        }));
        generation
    }

    /// Abort the pending timer (or in-flight fetch) and invalidate any
    /// outcome already queued.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            if !handle.is_finished() {
                debug!(generation = self.generation, "catalog: pending refresh cancelled");
            }
            handle.abort();
        }
        self.generation += 1;
    }

    /// Wait for the current generation's outcome. Pends forever when nothing is scheduled.
    pub async fn next(&mut self) -> RefreshOutcome {
        while let Some(outcome) = self.rx.recv().await {
            if let Some(current) = self.accept(outcome) {
                return current;
            }
        }
        std::future::pending().await
    }

    /// Non-blocking variant of [`RefreshScheduler::next`].
    pub fn try_next(&mut self) -> Option<RefreshOutcome> {
        while let Ok(outcome) = self.rx.try_recv() {
            if let Some(current) = self.accept(outcome) {
                return Some(current);
            }
        }
        None
    }

    fn accept(&mut self, outcome: RefreshOutcome) -> Option<RefreshOutcome> {
        if outcome.generation == self.generation {
            self.pending = None;
            Some(outcome)
        } else {
            debug!(stale = outcome.generation, current = self.generation, "catalog: dropping stale refresh");
            None
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "schedule_test.rs"]
mod tests;
