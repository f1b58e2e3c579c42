// Certificate cache: index, single-flight coordinator and the engine tying
// them together.

mod flight;
mod index;
pub mod metrics;
mod storage;

pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use storage::{CertCache, CertCacheBuilder};
