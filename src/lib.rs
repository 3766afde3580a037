// src/lib.rs
pub mod buffer;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod record;
mod server;
mod signal;
pub mod stats;

pub use signal::Signal;

// Re-export tracing for use in other modules
pub use tracing;

pub use buffer::{BufferFull, OverflowPolicy, SignalBuffer};
pub use config::{load_config_from_path, try_load_config, PipelineConfig, ResourceConfig};
pub use export::{Exporter, ExportError, HttpExporter, RetryConfig, SinkConfig};
pub use pipeline::{Pipeline, PipelineState, ShutdownTimeout, SubmitError};
pub use record::{
    AttrValue, Batch, KeyValue, LogRecord, MetricKind, MetricPoint, Record, Resource, Severity,
    Span, SpanId, SpanStatus, TraceId,
};
pub use server::{build_router, init_tracing, IngestResponse};
pub use stats::StatsSnapshot;
