use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ListenerConfig;
use crate::error::Result;
use crate::flusher::PeriodicFlusher;
use crate::metrics::measurements::{self, Lifecycle};
use crate::metrics::{
    ActiveThreadStats, MeasurementPoint, PointError, SampleEvent, SampleFilter,
    ThreadCountSnapshot, ThreadStatAggregator,
};
use crate::sink::{InfluxClient, InfluxSink, PointSink};

// ─── Engine-facing types ─────────────────────────────────────────

/// Instantaneous thread counters kept by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadCounts {
    pub started: u32,
    pub finished: u32,
}

/// Queried by the flusher once per interval.
pub trait ThreadCountSource: Send + Sync + 'static {
    fn thread_counts(&self) -> ThreadCounts;
}

/// Identity of one test execution; stamped onto every point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub test_name: String,
    pub run_id: String,
    pub node_name: String,
    /// Epoch ms when setup ran; origin of the history series
    pub test_start_time: i64,
}

impl RunContext {
    pub fn new(config: &ListenerConfig, test_start_time: i64) -> Self {
        Self {
            test_name: config.test_name.clone(),
            run_id: config.run_id.clone(),
            node_name: config.node_name.clone(),
            test_start_time,
        }
    }
}

// ─── Listener ────────────────────────────────────────────────────

/// Receives sample results from the engine and relays them to a sink.
///
/// Lifecycle: `setup_test` (or `start`) → any number of concurrent
/// `handle_sample_results` calls → `teardown_test`. A listener built from a
/// disabled config accepts every call and does nothing but log a warning.
pub struct BackendListener<S: PointSink = InfluxSink> {
    active: Option<ActiveRun<S>>,
}

struct ActiveRun<S: PointSink> {
    shared: Arc<Shared<S>>,
    flusher: PeriodicFlusher,
    shutdown_grace: Duration,
}

/// State read by both the worker path and the flusher.
struct Shared<S: PointSink> {
    run: RunContext,
    filter: SampleFilter,
    record_sub_samples: bool,
    aggregator: ThreadStatAggregator,
    threads: Arc<dyn ThreadCountSource>,
    sink: S,
}

impl BackendListener<InfluxSink> {
    /// Every recognised engine parameter with its default.
    pub fn default_parameters() -> Vec<(&'static str, String)> {
        ListenerConfig::default_parameters()
    }

    /// Parse the engine parameters and start writing to InfluxDB.
    pub async fn setup_test(
        params: &HashMap<String, String>,
        threads: Arc<dyn ThreadCountSource>,
    ) -> Result<Self> {
        let config = ListenerConfig::from_parameters(params)?;
        Self::setup_with_config(config, threads).await
    }

    /// Connect, make sure the database exists, start the writer, the
    /// flusher, and record the test start.
    pub async fn setup_with_config(
        config: ListenerConfig,
        threads: Arc<dyn ThreadCountSource>,
    ) -> Result<Self> {
        if config.disabled {
            warn_disabled();
            return Ok(Self::disabled());
        }

        let filter = SampleFilter::parse(&config.samplers_list, config.use_regex_for_sampler_list)?;

        let client = InfluxClient::new(&config.influx)?;
        client.ensure_database(&config.influx.database).await?;
        let sink = InfluxSink::start(client, &config.influx, &config.timing);

        Ok(Self::launch(config, filter, sink, threads))
    }
}

impl<S: PointSink> BackendListener<S> {
    /// A listener that ignores everything.
    pub fn disabled() -> Self {
        Self { active: None }
    }

    /// Start with a caller-supplied sink. No store bootstrap happens here.
    /// Must be called inside a Tokio runtime.
    pub fn start(
        config: ListenerConfig,
        sink: S,
        threads: Arc<dyn ThreadCountSource>,
    ) -> Result<Self> {
        if config.disabled {
            warn_disabled();
            return Ok(Self::disabled());
        }
        let filter = SampleFilter::parse(&config.samplers_list, config.use_regex_for_sampler_list)?;
        Ok(Self::launch(config, filter, sink, threads))
    }

    fn launch(
        config: ListenerConfig,
        filter: SampleFilter,
        sink: S,
        threads: Arc<dyn ThreadCountSource>,
    ) -> Self {
        let shared = Arc::new(Shared {
            run: RunContext::new(&config, now_ms()),
            filter,
            record_sub_samples: config.record_sub_samples,
            aggregator: ThreadStatAggregator::new(),
            threads,
            sink,
        });

        shared.emit(measurements::lifecycle_point(&shared.run, Lifecycle::Started, now_ms()));

        let firing = {
            let shared = Arc::clone(&shared);
            move || shared.flush_virtual_users()
        };
        let flusher = PeriodicFlusher::start(
            config.timing.flush_delay,
            config.timing.flush_interval,
            firing,
        );

        tracing::info!(
            test_name = %shared.run.test_name,
            run_id = %shared.run.run_id,
            node_name = %shared.run.node_name,
            record_sub_samples = shared.record_sub_samples,
            "backend listener started",
        );

        Self {
            active: Some(ActiveRun {
                shared,
                flusher,
                shutdown_grace: config.timing.shutdown_grace,
            }),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.active.is_none()
    }

    pub fn run_context(&self) -> Option<&RunContext> {
        self.active.as_ref().map(|a| &a.shared.run)
    }

    /// Called concurrently by engine worker threads with each batch of
    /// completed samples. Never blocks on the store and never fails.
    pub fn handle_sample_results(&self, samples: &[SampleEvent]) {
        let Some(active) = &self.active else {
            warn_disabled();
            return;
        };

        for sample in samples {
            active.shared.handle_sample(sample);
            if active.shared.record_sub_samples {
                for sub in &sample.sub_results {
                    active.shared.handle_sample(sub);
                }
            }
        }
    }

    /// Stop the flusher, record the final thread counts and the test end,
    /// then drain the sink. The flusher is fully stopped before anything
    /// else so no firing can race the sink shutdown. Each of the two waits
    /// is bounded by the shutdown grace period.
    pub async fn teardown_test(self) {
        let Some(active) = self.active else {
            warn_disabled();
            return;
        };

        active.flusher.stop(active.shutdown_grace).await;

        let shared = active.shared;
        let counts = shared.threads.thread_counts();
        let last = ThreadCountSnapshot::new(ActiveThreadStats::default(), 0, counts.finished);
        shared.emit(measurements::virtual_users_point(&shared.run, &last, now_ms()));
        shared.emit(measurements::lifecycle_point(&shared.run, Lifecycle::Finished, now_ms()));

        if tokio::time::timeout(active.shutdown_grace, shared.sink.shutdown())
            .await
            .is_err()
        {
            tracing::error!(grace = ?active.shutdown_grace, "timed out draining the sink");
        }
        tracing::info!(run_id = %shared.run.run_id, "backend listener stopped");
    }
}

// ─── Shared impl ─────────────────────────────────────────────────

impl<S: PointSink> Shared<S> {
    /// Concurrency is tracked for every sample; only filtered ones are written.
    fn handle_sample(&self, sample: &SampleEvent) {
        self.aggregator.record(sample.all_threads);

        if self.filter.matches(&sample.label) {
            for point in measurements::sample_points(&self.run, sample) {
                self.emit(point);
            }
        }
    }

    /// One flusher firing.
    fn flush_virtual_users(&self) -> Result<()> {
        let counts = self.threads.thread_counts();
        let active = self.aggregator.snapshot_and_reset();
        let snapshot = ThreadCountSnapshot::new(active, counts.started, counts.finished);
        let point = measurements::virtual_users_point(&self.run, &snapshot, now_ms())?;
        self.sink.emit(point);
        Ok(())
    }

    fn emit(&self, point: std::result::Result<MeasurementPoint, PointError>) {
        match point {
            Ok(point) => self.sink.emit(point),
            Err(e) => tracing::error!(error = %e, "dropping malformed point"),
        }
    }
}

fn warn_disabled() {
    tracing::warn!("backend listener is disabled. Skipping further operations");
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
