pub mod client;
pub mod influx;

use std::future::Future;
use std::sync::Arc;

use crate::metrics::MeasurementPoint;

pub use client::InfluxClient;
pub use influx::InfluxSink;

/// Destination for finished points.
///
/// `emit` is called from engine worker threads and from the flusher. It must
/// not block and must not fail: anything that goes wrong is logged by the
/// sink and the point is dropped.
pub trait PointSink: Send + Sync + 'static {
    fn emit(&self, point: MeasurementPoint);

    /// Deliver whatever is still buffered. Called once, at teardown.
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl<S: PointSink> PointSink for Arc<S> {
    fn emit(&self, point: MeasurementPoint) {
        (**self).emit(point);
    }

    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        (**self).shutdown()
    }
}
