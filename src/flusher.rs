use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Owned handle to the recurring background task.
///
/// Created running by [`PeriodicFlusher::start`]; [`PeriodicFlusher::stop`]
/// consumes it. Dropping without `stop` leaves the task running until the
/// runtime shuts down.
pub struct PeriodicFlusher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicFlusher {
    /// Run `firing` after `initial_delay` and then every `period`. A zero
    /// period is raised to one millisecond.
    ///
    /// A firing that returns an error or panics is logged and the schedule
    /// carries on. Must be called inside a Tokio runtime.
    pub fn start<F>(initial_delay: Duration, period: Duration, mut firing: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    Some(_) = ticks.next() => {
                        match panic::catch_unwind(AssertUnwindSafe(&mut firing)) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::error!(error = %e, "periodic flush failed"),
                            Err(_) => tracing::error!("periodic flush panicked"),
                        }
                    }
                }
            }
            tracing::debug!("periodic flusher exited");
        });

        Self { cancel, handle }
    }

    /// Admit no further firings and wait up to `grace` for one that is in
    /// flight. On timeout the task is aborted and the timeout is logged.
    pub async fn stop(self, grace: Duration) {
        tracing::info!("Shutting down periodic flusher...");
        self.cancel.cancel();

        let abort = self.handle.abort_handle();
        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(())) => tracing::info!("periodic flusher terminated"),
            Ok(Err(e)) => tracing::error!(error = %e, "periodic flusher task failed"),
            Err(_) => {
                tracing::error!(grace = ?grace, "timed out waiting for periodic flusher");
                abort.abort();
            }
        }
    }
}
