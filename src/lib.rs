//! Relays load-test sample results to InfluxDB.
//!
//! Engine worker threads hand completed samples to a [`BackendListener`].
//! Samples matching the configured filter become `requestsRaw`,
//! `responseRaw` and `requestsRawHistory` points; every sample also feeds the
//! active-thread statistics that a background flusher writes to
//! `virtualUsers` once per second. Delivery is best effort: store failures
//! are logged and never reach the engine.

pub mod config;
pub mod error;
pub mod flusher;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod sink;

pub use config::ListenerConfig;
pub use error::{ListenerError, Result};
pub use listener::{BackendListener, RunContext, ThreadCountSource, ThreadCounts};
pub use metrics::{MeasurementPoint, SampleEvent, SampleFilter};
pub use sink::{InfluxSink, PointSink};
