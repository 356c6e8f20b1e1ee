use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use influx_sample_listener::{BackendListener, SampleEvent, ThreadCountSource, ThreadCounts};

// ─── Simulated endpoints ─────────────────────────────────────────

/// (label, typical latency in ms)
static ENDPOINTS: &[(&str, u64)] = &[
    ("GET /api/users/:id", 8),
    ("GET /api/products/:id", 12),
    ("POST /api/sessions", 20),
    ("POST /api/users", 25),
];

/// Label of the page transaction whose children are embedded resources.
const PAGE_LABEL: &str = "GET /checkout";
static PAGE_RESOURCES: &[&str] = &["GET /static/app.js", "GET /static/app.css"];

// ─── Engine thread counters ──────────────────────────────────────

/// Started / finished counters of the simulated thread group.
#[derive(Debug, Default)]
pub struct EngineThreads {
    started: AtomicU32,
    finished: AtomicU32,
}

impl EngineThreads {
    fn active(&self) -> u32 {
        let started = self.started.load(Ordering::SeqCst);
        started.saturating_sub(self.finished.load(Ordering::SeqCst))
    }
}

impl ThreadCountSource for EngineThreads {
    fn thread_counts(&self) -> ThreadCounts {
        ThreadCounts {
            started: self.started.load(Ordering::SeqCst),
            finished: self.finished.load(Ordering::SeqCst),
        }
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks, ramped up `ramp_up_ms` apart, that
/// produce synthetic samples until the deadline or `running` goes false.
/// Workers still waiting out their ramp-up when `running` drops never start.
pub async fn run(
    running: Arc<AtomicBool>,
    listener: Arc<BackendListener>,
    threads: Arc<EngineThreads>,
    concurrency: u32,
    duration_secs: u64,
    ramp_up_ms: u64,
    error_pct: u8,
) {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let listener = listener.clone();
        let threads = threads.clone();

        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ramp_up_ms * u64::from(worker_id))).await;
            if !running.load(Ordering::SeqCst) {
                return;
            }
            threads.started.fetch_add(1, Ordering::SeqCst);
            worker(worker_id, &running, &listener, &threads, deadline, error_pct).await;
            threads.finished.fetch_add(1, Ordering::SeqCst);
        }));
    }

    // Wait for all workers to finish
    for h in handles {
        if let Err(e) = h.await {
            tracing::error!(error = %e, "load worker failed");
        }
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: &AtomicBool,
    listener: &BackendListener,
    threads: &EngineThreads,
    deadline: Instant,
    error_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + u64::from(id));
    let thread_name = format!("Thread Group 1-{}", id + 1);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let sample = if rng.gen_bool(0.1) {
            simulate_page(&mut rng, &thread_name, threads.active(), error_pct).await
        } else {
            let (label, typical_ms) = ENDPOINTS[rng.gen_range(0..ENDPOINTS.len())];
            simulate_request(&mut rng, label, typical_ms, &thread_name, threads.active(), error_pct)
                .await
        };

        listener.handle_sample_results(std::slice::from_ref(&sample));
    }
}

// ─── Simulated requests ──────────────────────────────────────────

async fn simulate_request(
    rng: &mut StdRng,
    label: &str,
    typical_ms: u64,
    thread_name: &str,
    all_threads: u32,
    error_pct: u8,
) -> SampleEvent {
    let start_time = chrono::Utc::now().timestamp_millis();

    // Jitter around the typical latency, with a long tail now and then
    let mut elapsed_ms = rng.gen_range(typical_ms / 2..=typical_ms * 2);
    if rng.gen_bool(0.02) {
        elapsed_ms *= 10;
    }
    tokio::time::sleep(Duration::from_millis(elapsed_ms)).await;

    let failed = rng.gen_range(0u8..100) < error_pct;
    let elapsed = elapsed_ms as i64;

    SampleEvent {
        label: label.to_owned(),
        start_time,
        end_time: start_time + elapsed,
        time: elapsed,
        connect_time: rng.gen_range(0..=2),
        latency: (elapsed * 3 / 4).max(1),
        bytes: if failed { 0 } else { rng.gen_range(200..8_000) },
        response_code: if failed { "500" } else { "200" }.to_owned(),
        error_count: i64::from(failed),
        thread_name: thread_name.to_owned(),
        all_threads,
        sub_results: Vec::new(),
    }
}

/// A page load: one parent sample whose children are the embedded resources.
async fn simulate_page(
    rng: &mut StdRng,
    thread_name: &str,
    all_threads: u32,
    error_pct: u8,
) -> SampleEvent {
    let mut children = Vec::with_capacity(PAGE_RESOURCES.len());
    for label in PAGE_RESOURCES {
        children.push(simulate_request(rng, label, 5, thread_name, all_threads, error_pct).await);
    }

    let start_time = children.first().map_or(0, |c| c.start_time);
    let end_time = children.last().map_or(start_time, |c| c.end_time);
    let error_count = children.iter().map(|c| c.error_count).sum();

    SampleEvent {
        label: PAGE_LABEL.to_owned(),
        start_time,
        end_time,
        time: end_time - start_time,
        connect_time: children.iter().map(|c| c.connect_time).sum(),
        latency: children.first().map_or(0, |c| c.latency),
        bytes: children.iter().map(|c| c.bytes).sum(),
        response_code: if error_count > 0 { "500" } else { "200" }.to_owned(),
        error_count,
        thread_name: thread_name.to_owned(),
        all_threads,
        sub_results: children,
    }
}
