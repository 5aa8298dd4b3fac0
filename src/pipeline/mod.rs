// src/pipeline/mod.rs

pub mod batch;
pub mod live;
pub mod metrics;

pub use batch::run_batch;
pub use live::{LiveStream, StreamFrame, ZoneSnapshot};
pub use metrics::PipelineMetrics;
