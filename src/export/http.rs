use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::export::{Exporter, ExportError};
use crate::record::{Batch, Record, Resource};
use crate::signal::Signal;

/// Downstream sink connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the sink; signal paths are appended (`/v1/traces`, ...)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Allow plaintext (http) transport to the sink
    #[serde(default = "default_insecure")]
    pub insecure: bool,
    /// Per-request timeout, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4317".to_string()
}

fn default_insecure() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            insecure: default_insecure(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// HTTP sink client. One instance serves all signal kinds; batches for
/// different kinds may be in flight concurrently.
#[derive(Debug)]
pub struct HttpExporter {
    client: Client,
    endpoints: HashMap<Signal, String>,
}

impl HttpExporter {
    /// Build a client for the configured sink.
    /// Returns an error if the endpoint and transport settings conflict or
    /// the HTTP client fails to build.
    pub fn new(sink: &SinkConfig) -> Result<Self, String> {
        let base = sink.endpoint.trim_end_matches('/');
        if base.is_empty() {
            return Err("sink endpoint is empty".to_string());
        }
        if base.starts_with("http://") && !sink.insecure {
            return Err(format!(
                "plaintext endpoint {} requires insecure = true",
                base
            ));
        }

        let client = Client::builder()
            .timeout(sink.timeout())
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;

        let endpoints = Signal::all()
            .iter()
            .map(|signal| (*signal, format!("{}/v1/{}", base, signal.path())))
            .collect();

        Ok(Self { client, endpoints })
    }

    fn endpoint_for(&self, signal: Signal) -> &str {
        // All signals are populated in new()
        self.endpoints
            .get(&signal)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    async fn export(&self, batch: &Batch) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }

        batch.validate().map_err(ExportError::Malformed)?;

        let endpoint = self.endpoint_for(batch.signal);
        let body = encode_ndjson(batch)?;
        debug!(
            endpoint,
            signal = %batch.signal,
            records = batch.len(),
            body_size = body.len(),
            "sending batch to sink"
        );

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExportError::Timeout
                } else if e.is_connect() {
                    ExportError::Connect(e.to_string())
                } else {
                    ExportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let resp_body = response
                .text()
                .await
                .unwrap_or_else(|_| "(failed to read body)".to_string());
            error!(
                endpoint,
                status,
                response_body = %resp_body,
                "sink returned error status"
            );
            return Err(ExportError::Http {
                status,
                endpoint: endpoint.to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct WireLine<'a> {
    resource: &'a Resource,
    #[serde(flatten)]
    record: &'a Record,
}

/// Encode a batch as NDJSON, one record per line with the resource inlined
fn encode_ndjson(batch: &Batch) -> Result<Bytes, ExportError> {
    let mut buf = BytesMut::new();
    for (idx, record) in batch.records.iter().enumerate() {
        let line = WireLine {
            resource: &batch.resource,
            record,
        };
        let json = serde_json::to_vec(&line)
            .map_err(|e| ExportError::Encode(format!("record {}: {}", idx, e)))?;
        if idx > 0 {
            buf.put_slice(b"\n");
        }
        buf.extend_from_slice(&json);
    }
    Ok(buf.freeze())
}
