//! Observability for the controller client
//!
//! - [`logging`]: subscriber installation for binaries and tests
//! - [`metrics`]: task monitor counters exposed through
//!   `ApiClient::task_metrics`

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, LogFormat};
pub use metrics::{TaskMonitorMetrics, TaskMonitorSnapshot};
