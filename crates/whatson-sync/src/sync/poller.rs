use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::SyncOptions;
use crate::config::ChangeDetection;
use crate::domain::Event;
use crate::store::StoreClient;

/// Floor for the polling period; a zero period would stop the ticker.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the poller last saw of the events collection. Lives as long as the
/// owning synchronizer.
#[derive(Debug, Default)]
pub struct PollState {
    last_count: usize,
    known_ids: HashSet<String>,
}

impl PollState {
    pub fn last_count(&self) -> usize {
        self.last_count
    }

    /// Records a fresh listing and reports whether it counts as new under
    /// the given policy.
    pub fn observe(&mut self, events: &[Event], detection: ChangeDetection) -> bool {
        let is_new = match detection {
            ChangeDetection::Count => events.len() > self.last_count,
            ChangeDetection::NewIdentifiers => {
                events.iter().any(|e| !self.known_ids.contains(&e.id))
            }
        };

        self.last_count = events.len();
        self.known_ids = events.iter().map(|e| e.id.clone()).collect();
        is_new
    }
}

/// Cancels a poller. Cancelling more than once, or after the synchronizer
/// started a newer poller, is harmless.
#[derive(Debug, Clone)]
pub struct PollHandle {
    abort: AbortHandle,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.abort.is_finished()
    }

    pub(super) fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

pub(super) fn spawn<F>(
    store: StoreClient,
    state: Arc<Mutex<PollState>>,
    options: SyncOptions,
    on_new_events: F,
) -> PollHandle
where
    F: Fn(Vec<Event>) + Send + Sync + 'static,
{
    let period = options.interval.max(MIN_POLL_INTERVAL);
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.fetch_all_events().await {
                Ok(events) => {
                    let (previous, is_new) = {
                        let mut state = state.lock().await;
                        let previous = state.last_count();
                        (previous, state.observe(&events, options.change_detection))
                    };
                    if is_new {
                        info!(
                            previous,
                            current = events.len(),
                            "new events found"
                        );
                        on_new_events(events);
                    } else {
                        debug!(count = events.len(), "no new events");
                    }
                }
                Err(e) => {
                    error!(error = %e, "polling error");
                }
            }
        }
    });

    PollHandle {
        abort: task.abort_handle(),
    }
}
