use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::client::InfluxClient;
use super::PointSink;
use crate::config::{InfluxConfig, TimingConfig};
use crate::metrics::MeasurementPoint;

/// Floor for the batch interval; a zero period cannot be scheduled.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Fire-and-forget sink backed by a single batching writer task.
///
/// `emit` only enqueues. The writer POSTs a batch whenever `batch_size`
/// points are buffered or `batch_interval` elapses, whichever is first.
/// Failed writes are logged and the batch is discarded.
pub struct InfluxSink {
    tx: mpsc::Sender<MeasurementPoint>,
    cancel: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
    abort: AbortHandle,
    dropped: AtomicU64,
}

/// Everything the writer task owns.
struct Writer {
    client: InfluxClient,
    database: String,
    retention_policy: String,
    batch_size: usize,
}

// ─── InfluxSink impl ─────────────────────────────────────────────

impl InfluxSink {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn start(client: InfluxClient, influx: &InfluxConfig, timing: &TimingConfig) -> Self {
        let (tx, rx) = mpsc::channel(timing.queue_capacity.max(1));
        let cancel = CancellationToken::new();

        let writer = Writer {
            client,
            database: influx.database.clone(),
            retention_policy: influx.retention_policy.clone(),
            batch_size: timing.batch_size.max(1),
        };
        let batch_interval = timing.batch_interval.max(MIN_INTERVAL);
        let handle = tokio::spawn(writer.run(rx, cancel.clone(), batch_interval));

        tracing::info!(
            database = %influx.database,
            retention_policy = %influx.retention_policy,
            batch_size = timing.batch_size,
            batch_interval = ?batch_interval,
            "InfluxDB writer started",
        );

        Self {
            tx,
            cancel,
            abort: handle.abort_handle(),
            writer: Mutex::new(Some(handle)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Points discarded because the queue was full or already closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self, reason: &'static str) {
        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        // First drop and then every thousandth, to keep the log readable
        if n == 1 || n % 1_000 == 0 {
            tracing::warn!(dropped = n, reason, "dropping measurement point");
        }
    }
}

impl PointSink for InfluxSink {
    fn emit(&self, point: MeasurementPoint) {
        match self.tx.try_send(point) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.record_drop("queue full"),
            Err(TrySendError::Closed(_)) => self.record_drop("writer stopped"),
        }
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "InfluxDB writer task failed");
            }
        }
        tracing::info!(dropped = self.dropped(), "InfluxDB writer stopped");
    }
}

impl Drop for InfluxSink {
    /// A writer still running here was abandoned by a timed-out shutdown.
    fn drop(&mut self) {
        self.abort.abort();
    }
}

// ─── Writer task ─────────────────────────────────────────────────

impl Writer {
    async fn run(
        self,
        mut rx: mpsc::Receiver<MeasurementPoint>,
        cancel: CancellationToken,
        batch_interval: Duration,
    ) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let start = tokio::time::Instant::now() + batch_interval;
        let mut ticker = tokio::time::interval_at(start, batch_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Stop accepting, then drain what is already queued
                    rx.close();
                    while let Some(point) = rx.recv().await {
                        batch.push(point);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch).await;
                        }
                    }
                    self.flush(&mut batch).await;
                    return;
                }

                item = rx.recv() => match item {
                    Some(point) => {
                        batch.push(point);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => {
                        self.flush(&mut batch).await;
                        return;
                    }
                },

                _ = ticker.tick() => self.flush(&mut batch).await,
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<MeasurementPoint>) {
        if batch.is_empty() {
            return;
        }
        let points = std::mem::replace(batch, Vec::with_capacity(self.batch_size));

        let mut body = String::with_capacity(points.len() * 128);
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                body.push('\n');
            }
            point.write_line_protocol(&mut body);
        }

        match self
            .client
            .write(&self.database, &self.retention_policy, body)
            .await
        {
            Ok(()) => tracing::debug!(points = points.len(), "wrote batch to InfluxDB"),
            Err(e) => tracing::error!(
                error = %e,
                points = points.len(),
                "Failed writing to InfluxDB",
            ),
        }
    }
}
