//! Worker-path and flusher behaviour with an in-memory sink.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use influx_sample_listener::metrics::FieldValue;
use influx_sample_listener::{
    BackendListener, ListenerConfig, MeasurementPoint, PointSink, SampleEvent, ThreadCountSource,
    ThreadCounts,
};

#[derive(Default)]
struct MemorySink {
    points: Mutex<Vec<MeasurementPoint>>,
    shut_down: AtomicU32,
}

impl MemorySink {
    fn named(&self, measurement: &str) -> Vec<MeasurementPoint> {
        self.points
            .lock()
            .iter()
            .filter(|p| p.measurement() == measurement)
            .cloned()
            .collect()
    }
}

impl PointSink for MemorySink {
    fn emit(&self, point: MeasurementPoint) {
        self.points.lock().push(point);
    }

    async fn shutdown(&self) {
        self.shut_down.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that drops everything, as a store rejecting every write would.
struct BlackHole {
    attempts: AtomicU32,
}

impl PointSink for BlackHole {
    fn emit(&self, _point: MeasurementPoint) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Counters {
    started: AtomicU32,
    finished: AtomicU32,
}

impl ThreadCountSource for Counters {
    fn thread_counts(&self) -> ThreadCounts {
        ThreadCounts {
            started: self.started.load(Ordering::SeqCst),
            finished: self.finished.load(Ordering::SeqCst),
        }
    }
}

fn sample(label: &str, all_threads: u32) -> SampleEvent {
    SampleEvent {
        label: label.into(),
        start_time: 1_000,
        time: 50,
        connect_time: 5,
        latency: 2,
        response_code: "200".into(),
        all_threads,
        ..SampleEvent::default()
    }
}

fn int(point: &MeasurementPoint, field: &str) -> i64 {
    match point.field(field) {
        Some(FieldValue::Integer(v)) => *v,
        other => panic!("{field} is {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn flusher_reports_all_samples_not_just_filtered_ones() {
    let sink = Arc::new(MemorySink::default());
    let counters = Arc::new(Counters::default());
    counters.started.store(6, Ordering::SeqCst);

    let config = ListenerConfig {
        samplers_list: "checkout".into(),
        use_regex_for_sampler_list: false,
        ..ListenerConfig::default()
    };
    let listener = BackendListener::start(config, Arc::clone(&sink), counters.clone()).unwrap();

    // Only "checkout" is written, yet all three feed the thread stats
    listener.handle_sample_results(&[
        sample("home", 2),
        sample("checkout", 4),
        sample("search", 6),
    ]);
    assert_eq!(sink.named("requestsRaw").len(), 1);

    // First firing at +1s
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let users = sink.named("virtualUsers");
    assert_eq!(users.len(), 1);
    assert_eq!(int(&users[0], "minActiveThreads"), 2);
    assert_eq!(int(&users[0], "meanActiveThreads"), 4);
    assert_eq!(int(&users[0], "maxActiveThreads"), 6);
    assert_eq!(int(&users[0], "startedThreads"), 6);

    // Next window saw nothing
    tokio::time::sleep(Duration::from_secs(1)).await;
    let users = sink.named("virtualUsers");
    assert_eq!(users.len(), 2);
    assert_eq!(int(&users[1], "maxActiveThreads"), 0);
    assert_eq!(int(&users[1], "meanActiveThreads"), 0);

    listener.teardown_test().await;
    assert_eq!(sink.shut_down.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn no_flusher_records_after_teardown() {
    let sink = Arc::new(MemorySink::default());
    let counters = Arc::new(Counters::default());
    counters.finished.store(3, Ordering::SeqCst);

    let listener =
        BackendListener::start(ListenerConfig::default(), Arc::clone(&sink), counters).unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    listener.teardown_test().await;

    let total = sink.points.lock().len();
    let finished = sink.points.lock().last().cloned().unwrap();
    assert_eq!(finished.tag("type"), Some("finished"));

    let users = sink.named("virtualUsers");
    // Three firings plus the zeroed record written at teardown
    assert_eq!(users.len(), 4);
    assert_eq!(int(&users[3], "finishedThreads"), 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.points.lock().len(), total);
}

#[tokio::test]
async fn concurrent_workers_produce_every_record() {
    let sink = Arc::new(MemorySink::default());
    let mut config = ListenerConfig {
        samplers_list: "even-.*".into(),
        ..ListenerConfig::default()
    };
    config.timing.flush_delay = Duration::from_secs(3_600);

    let listener = Arc::new(
        BackendListener::start(config, Arc::clone(&sink), Arc::new(Counters::default())).unwrap(),
    );
    sink.points.lock().clear();

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let listener = Arc::clone(&listener);
            std::thread::spawn(move || {
                for i in 0..250 {
                    let label = if i % 2 == 0 { "even-req" } else { "odd-req" };
                    listener.handle_sample_results(&[sample(label, t)]);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    // 8 workers × 125 matching samples × 3 records
    assert_eq!(sink.points.lock().len(), 3_000);
    assert_eq!(sink.named("responseRaw").len(), 1_000);
    assert!(sink
        .named("responseRaw")
        .iter()
        .all(|p| p.timestamp_ms() == 1_057));

    let listener = Arc::try_unwrap(listener).ok().unwrap();
    listener.teardown_test().await;
}

#[tokio::test]
async fn dropping_sink_leaves_the_worker_path_untouched() {
    let sink = Arc::new(BlackHole {
        attempts: AtomicU32::new(0),
    });
    let listener = BackendListener::start(
        ListenerConfig::default(),
        Arc::clone(&sink),
        Arc::new(Counters::default()),
    )
    .unwrap();

    for _ in 0..10 {
        listener.handle_sample_results(&[sample("A", 1)]);
    }
    listener.teardown_test().await;

    // started + 30 request records + final users + finished
    assert!(sink.attempts.load(Ordering::SeqCst) >= 33);
}
