use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

type Job = Box<dyn FnOnce() + Send>;

/// Jobs kept while no runtime is available; the oldest are dropped beyond this.
pub(crate) const MAX_PENDING_JOBS: usize = 1024;

#[derive(Default)]
struct Queue {
    tx: Option<UnboundedSender<Job>>,
    pending: VecDeque<Job>,
}

/// Runs submitted jobs on the Tokio runtime, after the submitting call returned.
///
/// The drain task is spawned on the runtime of the submitting call. When that runtime shuts
/// down, the next submission made inside a runtime spawns a new drain there. Jobs submitted
/// outside of any runtime wait in a bounded queue until then.
#[derive(Default)]
pub struct Dispatcher {
    queue: Mutex<Queue>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.lock();
        let mut job: Job = Box::new(job);
        if let Some(tx) = queue.tx.take() {
            match tx.send(job) {
                Ok(()) => {
                    queue.tx = Some(tx);
                    return;
                }
                Err(err) => {
                    debug!("The deferred job runner stopped with its runtime, restarting it");
                    job = err.0;
                }
            }
        }

        match Handle::try_current() {
            Ok(handle) => {
                let (tx, mut rx) = unbounded_channel::<Job>();
                handle.spawn(async move {
                    while let Some(job) = rx.recv().await {
                        job();
                    }
                });
                for pending in queue.pending.drain(..).chain(std::iter::once(job)) {
                    _ = tx.send(pending);
                }
                queue.tx = Some(tx);
            }
            Err(_) => {
                if queue.pending.len() >= MAX_PENDING_JOBS {
                    debug!("Dropping the oldest deferred job, no runtime is available to run it");
                    queue.pending.pop_front();
                }
                queue.pending.push_back(job);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
