//! HTTP ingestion front-end: producers push records at `/v1/<signal>`,
//! the pipeline does the rest.

use std::io::Read;
use std::sync::Arc;

use axum::{
    body::Bytes as AxumBytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::pipeline::{Pipeline, SubmitError};
use crate::record::{LogRecord, MetricPoint, Record, Span};
use crate::stats::StatsSnapshot;

const MAX_DECOMPRESSED_SIZE: usize = 10 * 1024 * 1024;

/// Initialize the tracing subscriber.
/// Uses the RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();
}

#[derive(Debug, serde::Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub accepted: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub rejected: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/v1/traces", post(ingest_traces))
        .route("/v1/metrics", post(ingest_metrics))
        .route("/v1/logs", post(ingest_logs))
        .route("/v1/stats", get(stats))
        .route("/health", get(|| async { "ok" }))
        .with_state(pipeline)
}

async fn ingest_traces(
    State(pipeline): State<Arc<Pipeline>>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Json<IngestResponse>, (StatusCode, String)> {
    ingest_records::<Span>(&pipeline, &headers, body).await
}

async fn ingest_metrics(
    State(pipeline): State<Arc<Pipeline>>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Json<IngestResponse>, (StatusCode, String)> {
    ingest_records::<MetricPoint>(&pipeline, &headers, body).await
}

async fn ingest_logs(
    State(pipeline): State<Arc<Pipeline>>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Json<IngestResponse>, (StatusCode, String)> {
    ingest_records::<LogRecord>(&pipeline, &headers, body).await
}

async fn stats(State(pipeline): State<Arc<Pipeline>>) -> Json<StatsSnapshot> {
    Json(pipeline.stats())
}

/// Decode a JSON array of records and submit each to the pipeline
async fn ingest_records<T>(
    pipeline: &Pipeline,
    headers: &HeaderMap,
    body: AxumBytes,
) -> Result<Json<IngestResponse>, (StatusCode, String)>
where
    T: DeserializeOwned + Into<Record>,
{
    let body = decompress_if_gzipped(Bytes::from(body.to_vec()), is_gzipped(headers))
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let records: Vec<T> = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid payload: {}", e)))?;

    let total = records.len();
    let mut accepted = 0;
    let mut rejected = 0;
    for record in records {
        match pipeline.submit(record.into()) {
            Ok(()) => accepted += 1,
            Err(SubmitError::BufferFull) => rejected += 1,
            Err(SubmitError::PipelineStopped) => {
                return Err((
                    StatusCode::SERVICE_UNAVAILABLE,
                    SubmitError::PipelineStopped.to_string(),
                ))
            }
        }
    }

    debug!(total, accepted, rejected, "ingest request handled");

    if accepted == 0 && rejected > 0 {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            SubmitError::BufferFull.to_string(),
        ));
    }

    let status = if rejected == 0 { "ok" } else { "partial" };
    Ok(Json(IngestResponse {
        status,
        accepted,
        rejected,
    }))
}

fn is_gzipped(headers: &HeaderMap) -> bool {
    headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

fn decompress_if_gzipped(body: Bytes, is_gzipped: bool) -> Result<Bytes, String> {
    if !is_gzipped {
        if body.len() > MAX_DECOMPRESSED_SIZE {
            return Err(format!(
                "body exceeds {}MB limit",
                MAX_DECOMPRESSED_SIZE / 1024 / 1024
            ));
        }
        return Ok(body);
    }

    debug!(compressed_size = body.len(), "decompressing gzipped body");
    let decoder = GzDecoder::new(body.as_ref());
    let mut decompressed = Vec::with_capacity(body.len().saturating_mul(2));
    let bytes_read = decoder
        .take((MAX_DECOMPRESSED_SIZE + 1) as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| {
            error!(error = %e, "gzip decompression failed");
            e.to_string()
        })?;
    if bytes_read > MAX_DECOMPRESSED_SIZE {
        error!(
            bytes_read,
            max = MAX_DECOMPRESSED_SIZE,
            "decompressed size exceeds limit"
        );
        return Err(format!(
            "decompressed body exceeds {}MB limit",
            MAX_DECOMPRESSED_SIZE / 1024 / 1024
        ));
    }
    Ok(Bytes::from(decompressed))
}
