pub mod filter;
pub mod measurements;
pub mod point;
pub mod threads;

pub use filter::SampleFilter;
pub use point::{FieldValue, MeasurementPoint, PointError};
pub use threads::{ActiveThreadStats, ThreadCountSnapshot, ThreadStatAggregator};

/// One completed request observation handed over by the engine.
/// Read-only to the listener; every time is in epoch milliseconds or
/// milliseconds of duration.
#[derive(Debug, Clone, Default)]
pub struct SampleEvent {
    /// e.g. "GET /api/users/:id"
    pub label: String,
    pub start_time: i64,
    pub end_time: i64,
    /// Total elapsed time of the request
    pub time: i64,
    pub connect_time: i64,
    /// Time to first byte
    pub latency: i64,
    pub bytes: i64,
    /// "200", "404", "Non HTTP response code: ..." etc.
    pub response_code: String,
    pub error_count: i64,
    pub thread_name: String,
    /// Active threads across all thread groups when the sample completed
    pub all_threads: u32,
    /// Child samples (redirects, embedded resources, transaction members)
    pub sub_results: Vec<SampleEvent>,
}

impl SampleEvent {
    /// Instant the response was fully received, as the raw-response series
    /// stamps it.
    pub fn completion_time(&self) -> i64 {
        self.start_time + self.time + self.connect_time + self.latency
    }
}
