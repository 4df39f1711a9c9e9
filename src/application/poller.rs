//! Fixed-interval job runner with cancel handles

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Cancels the poller's timer. Idempotent, also runs on drop.
/// Jobs already started keep running to completion.
pub struct PollerHandle {
    name: String,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("⏹️ Poller {} cancelled", self.name);
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerHandle")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Poller;

impl Poller {
    /// Run `job` every `period`, immediately first when `run_first` is set.
    ///
    /// Every tick runs the job in its own task; the timer never awaits it. A
    /// tick that fires while the previous job is still running is skipped.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, run_first: bool, job: F) -> PollerHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let start = if run_first {
            Instant::now()
        } else {
            Instant::now() + period
        };

        let in_flight = Arc::new(AtomicBool::new(false));
        let tick_name = name.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if in_flight.swap(true, Ordering::SeqCst) {
                    debug!("⏭️ {} tick skipped, previous run still in flight", tick_name);
                    continue;
                }

                let guard = InFlight(Arc::clone(&in_flight));
                let run = job();
                tokio::spawn(async move {
                    let _guard = guard;
                    run.await;
                });
            }
        });

        PollerHandle {
            name,
            task: Some(task),
        }
    }
}
