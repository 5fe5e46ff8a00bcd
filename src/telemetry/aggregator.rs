use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::telemetry::events::{TelemetryEvent, TelemetryEvents};
use crate::telemetry::uploader::{TelemetryUploader, UploadOutcome};

/// Describes the counters kept by a [`PeriodicAggregator`] and how a window of them is shipped.
pub trait Summarizer: Send + Sync + 'static {
    type Key: Eq + Hash + Send;
    type Counter: Send;

    const NAME: &'static str;

    fn into_event(
        counters: HashMap<Self::Key, Self::Counter>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryEvent;
}

pub(crate) struct Window<K, C> {
    pub(crate) counters: HashMap<K, C>,
    pub(crate) start: DateTime<Utc>,
}

/// Bounded keyed counters, shipped on a timer and once more when stopped.
pub struct PeriodicAggregator<S: Summarizer> {
    window: Mutex<Window<S::Key, S::Counter>>,
    max_keys: usize,
    interval: Duration,
    uploader: Arc<TelemetryUploader>,
    instance_hash: String,
    token: CancellationToken,
}

impl<S: Summarizer> PeriodicAggregator<S> {
    pub fn new(
        uploader: Arc<TelemetryUploader>,
        instance_hash: &str,
        max_keys: usize,
        interval: Duration,
    ) -> Self {
        Self {
            window: Mutex::new(Window {
                counters: HashMap::new(),
                start: Utc::now(),
            }),
            max_keys,
            interval,
            uploader,
            instance_hash: instance_hash.to_owned(),
            token: CancellationToken::new(),
        }
    }

    /// Updates the counter of `key`, creating it with `init` when missing.
    /// New keys are dropped once the window holds `max_keys` keys.
    pub fn record_with<I, U>(&self, key: S::Key, init: I, update: U)
    where
        I: FnOnce() -> S::Counter,
        U: FnOnce(&mut S::Counter),
    {
        let mut window = self.lock();
        if !window.counters.contains_key(&key) && window.counters.len() >= self.max_keys {
            return;
        }
        update(window.counters.entry(key).or_insert_with(init));
    }

    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let token = self.token.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut int = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = int.tick() => {
                        this.flush().await;
                    },
                    _ = token.cancelled() => break
                }
            }
        });
    }

    /// Ships the current window. Returns [`None`] when the window was empty.
    pub async fn flush(&self) -> Option<UploadOutcome> {
        let (counters, start, end) = {
            let mut window = self.lock();
            let end = Utc::now();
            let counters = std::mem::take(&mut window.counters);
            let start = std::mem::replace(&mut window.start, end);
            (counters, start, end)
        };
        if counters.is_empty() {
            return None;
        }
        debug!("{} flushing {} keys", S::NAME, counters.len());
        let events = TelemetryEvents {
            instance_hash: self.instance_hash.clone(),
            events: vec![S::into_event(counters, start, end)],
        };
        Some(self.uploader.post(&events).await)
    }

    /// Stops the timer and flushes once.
    pub async fn stop(&self) -> Option<UploadOutcome> {
        self.token.cancel();
        self.flush().await
    }

    pub fn stop_timer(&self) {
        self.token.cancel();
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Window<S::Key, S::Counter>> {
        match self.window.lock() {
            Ok(window) => window,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
