//! Measurement vocabulary and the sample → point transformations.
//!
//! All functions here are pure: the same run context and sample always
//! produce the same points.

use super::point::{MeasurementPoint, PointError};
use super::threads::ThreadCountSnapshot;
use super::SampleEvent;
use crate::listener::RunContext;

/// Per-request latency, stamped at the sample's start time.
pub mod request {
    pub const MEASUREMENT: &str = "requestsRaw";
    /// Same series re-stamped relative to the test start.
    pub const HISTORY_MEASUREMENT: &str = "requestsRawHistory";

    pub mod tags {
        pub const REQUEST_NAME: &str = "requestName";
        pub const RUN_ID: &str = "runId";
        pub const TEST_NAME: &str = "testName";
        pub const RESPONSE_CODE: &str = "responseCodeTag";
    }

    pub mod fields {
        pub const ERROR_COUNT: &str = "errorCount";
        pub const THREAD_NAME: &str = "threadName";
        pub const NODE_NAME: &str = "nodeName";
        pub const RESPONSE_SIZE: &str = "responseBytes";
        pub const RESPONSE_CODE: &str = "responseCode";
        pub const LATENCY: &str = "latency";
        pub const CONNECT_TIME: &str = "connectTime";
        pub const RESPONSE_TIME: &str = "responseTime";
        pub const END_TIME: &str = "endTime";
    }
}

/// Completion instant of each request.
pub mod response_raw {
    pub const MEASUREMENT: &str = "responseRaw";
}

pub mod virtual_users {
    pub const MEASUREMENT: &str = "virtualUsers";

    pub mod tags {
        pub const NODE_NAME: &str = "nodeName";
        pub const TEST_NAME: &str = "testName";
        pub const RUN_ID: &str = "runId";
    }

    pub mod fields {
        pub const MIN_ACTIVE_THREADS: &str = "minActiveThreads";
        pub const MEAN_ACTIVE_THREADS: &str = "meanActiveThreads";
        pub const MAX_ACTIVE_THREADS: &str = "maxActiveThreads";
        pub const STARTED_THREADS: &str = "startedThreads";
        pub const FINISHED_THREADS: &str = "finishedThreads";
    }
}

pub mod test_start_end {
    pub const MEASUREMENT: &str = "testStartEnd";

    pub mod tags {
        pub const TYPE: &str = "type";
        pub const NODE_NAME: &str = "nodeName";
        pub const RUN_ID: &str = "runId";
        pub const TEST_NAME: &str = "testName";
    }

    pub mod fields {
        pub const PLACEHOLDER: &str = "placeholder";
    }

    pub mod values {
        pub const STARTED: &str = "started";
        pub const FINISHED: &str = "finished";
    }
}

/// Which end of the run a lifecycle record marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Started,
    Finished,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => test_start_end::values::STARTED,
            Self::Finished => test_start_end::values::FINISHED,
        }
    }
}

// ─── Per-sample records ──────────────────────────────────────────

/// The three records written for every sample that passes the filter:
/// request latency, raw response, and the start-relative history copy.
pub fn sample_points(
    run: &RunContext,
    sample: &SampleEvent,
) -> [Result<MeasurementPoint, PointError>; 3] {
    [
        request_point(run, sample),
        response_raw_point(run, sample),
        history_point(run, sample),
    ]
}

pub fn request_point(
    run: &RunContext,
    sample: &SampleEvent,
) -> Result<MeasurementPoint, PointError> {
    use request::{fields, tags};

    MeasurementPoint::builder(request::MEASUREMENT)
        .time(sample.start_time)
        .tag(tags::REQUEST_NAME, sample.label.as_str())
        .tag(tags::RUN_ID, run.run_id.as_str())
        .tag(tags::TEST_NAME, run.test_name.as_str())
        .tag(tags::RESPONSE_CODE, sample.response_code.as_str())
        .field(fields::ERROR_COUNT, sample.error_count)
        .field(fields::THREAD_NAME, sample.thread_name.as_str())
        .field(fields::NODE_NAME, run.node_name.as_str())
        .field(fields::RESPONSE_SIZE, sample.bytes)
        .field(fields::RESPONSE_CODE, sample.response_code.as_str())
        .field(fields::LATENCY, sample.latency)
        .field(fields::CONNECT_TIME, sample.connect_time)
        .field(fields::RESPONSE_TIME, sample.time)
        .field(fields::END_TIME, sample.end_time)
        .build()
}

pub fn response_raw_point(
    run: &RunContext,
    sample: &SampleEvent,
) -> Result<MeasurementPoint, PointError> {
    use request::{fields, tags};

    MeasurementPoint::builder(response_raw::MEASUREMENT)
        .time(sample.completion_time())
        .tag(tags::REQUEST_NAME, sample.label.as_str())
        .tag(tags::RUN_ID, run.run_id.as_str())
        .tag(tags::TEST_NAME, run.test_name.as_str())
        .tag(tags::RESPONSE_CODE, sample.response_code.as_str())
        .field(fields::END_TIME, sample.end_time)
        .build()
}

/// Request record stamped with the offset from the test start, so runs
/// can be overlaid on a common time axis.
pub fn history_point(
    run: &RunContext,
    sample: &SampleEvent,
) -> Result<MeasurementPoint, PointError> {
    use request::{fields, tags};

    MeasurementPoint::builder(request::HISTORY_MEASUREMENT)
        .time(sample.start_time - run.test_start_time)
        .tag(tags::REQUEST_NAME, sample.label.as_str())
        .tag(tags::RUN_ID, run.run_id.as_str())
        .tag(tags::TEST_NAME, run.test_name.as_str())
        .tag(tags::RESPONSE_CODE, sample.response_code.as_str())
        .field(fields::ERROR_COUNT, sample.error_count)
        .field(fields::THREAD_NAME, sample.thread_name.as_str())
        .field(fields::NODE_NAME, run.node_name.as_str())
        .field(fields::RESPONSE_CODE, sample.response_code.as_str())
        .field(fields::RESPONSE_SIZE, sample.bytes)
        .field(fields::LATENCY, sample.latency)
        .field(fields::CONNECT_TIME, sample.connect_time)
        .field(fields::RESPONSE_TIME, sample.time)
        .build()
}

// ─── Run-level records ───────────────────────────────────────────

pub fn virtual_users_point(
    run: &RunContext,
    snapshot: &ThreadCountSnapshot,
    now_ms: i64,
) -> Result<MeasurementPoint, PointError> {
    use virtual_users::{fields, tags};

    // Rounded so the field keeps its integer type across windows
    let mean = snapshot.active.mean.round() as i64;

    MeasurementPoint::builder(virtual_users::MEASUREMENT)
        .time(now_ms)
        .tag(tags::NODE_NAME, run.node_name.as_str())
        .tag(tags::TEST_NAME, run.test_name.as_str())
        .tag(tags::RUN_ID, run.run_id.as_str())
        .field(fields::MIN_ACTIVE_THREADS, snapshot.active.min)
        .field(fields::MEAN_ACTIVE_THREADS, mean)
        .field(fields::MAX_ACTIVE_THREADS, snapshot.active.max)
        .field(fields::STARTED_THREADS, snapshot.started)
        .field(fields::FINISHED_THREADS, snapshot.finished)
        .build()
}

pub fn lifecycle_point(
    run: &RunContext,
    event: Lifecycle,
    now_ms: i64,
) -> Result<MeasurementPoint, PointError> {
    use test_start_end::{fields, tags};

    MeasurementPoint::builder(test_start_end::MEASUREMENT)
        .time(now_ms)
        .tag(tags::TYPE, event.as_str())
        .tag(tags::NODE_NAME, run.node_name.as_str())
        .tag(tags::RUN_ID, run.run_id.as_str())
        .tag(tags::TEST_NAME, run.test_name.as_str())
        .field(fields::PLACEHOLDER, "1")
        .build()
}
