//! Delivery of batches to a downstream sink.

use async_trait::async_trait;

use crate::record::Batch;

mod http;
pub mod retry;

pub use http::{HttpExporter, SinkConfig};
pub use retry::{with_retry, IsRetryable, RetryConfig};

/// Errors that can occur while delivering a batch to a sink
#[derive(Debug)]
pub enum ExportError {
    Timeout,
    Connect(String),
    Network(String),
    Http { status: u16, endpoint: String },
    Malformed(String),
    Encode(String),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Timeout => write!(f, "request timed out"),
            ExportError::Connect(msg) => write!(f, "connect error: {}", msg),
            ExportError::Network(msg) => write!(f, "network error: {}", msg),
            ExportError::Http { status, endpoint } => {
                write!(f, "HTTP {} from {}", status, endpoint)
            }
            ExportError::Malformed(msg) => write!(f, "malformed batch: {}", msg),
            ExportError::Encode(msg) => write!(f, "encode error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl IsRetryable for ExportError {
    fn is_retryable(&self) -> bool {
        match self {
            ExportError::Timeout => true,
            ExportError::Connect(_) => true,
            ExportError::Network(_) => true,
            ExportError::Http { status, .. } => matches!(status, 502..=504),
            ExportError::Malformed(_) => false,
            ExportError::Encode(_) => false,
        }
    }
}

/// Capability to send a batch of records to a remote sink.
///
/// Implementations must be safe to invoke concurrently for different
/// batches; the coordinator guarantees a given batch is handed to exactly
/// one in-flight call. An empty batch must succeed without any I/O.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, batch: &Batch) -> Result<(), ExportError>;
}
