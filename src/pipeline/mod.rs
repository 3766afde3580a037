//! Pipeline coordinator: routes submissions to per-kind buffers and owns
//! the lifecycle `Created → Running → Draining → Stopped`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::buffer::SignalBuffer;
use crate::config::PipelineConfig;
use crate::export::Exporter;
use crate::record::{LogRecord, MetricPoint, Record, Resource, Span};
use crate::signal::Signal;
use crate::stats::{PipelineStats, StatsSnapshot};

mod lane;

use lane::Lane;

/// Lifecycle state of the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Running,
    Draining,
    Stopped,
}

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const DRAINING: u8 = 2;
const STOPPED: u8 = 3;

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            CREATED => PipelineState::Created,
            RUNNING => PipelineState::Running,
            DRAINING => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }
}

/// Producer-visible submission failures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The kind-specific buffer is at capacity under the reject policy.
    /// The caller may retry later or drop the record.
    BufferFull,
    /// The pipeline is not accepting submissions (not started, draining,
    /// or stopped). Terminal for this call.
    PipelineStopped,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::BufferFull => f.write_str("buffer at capacity"),
            SubmitError::PipelineStopped => f.write_str("pipeline is not accepting submissions"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Returned from `shutdown`/`force_flush` when the deadline elapsed
/// before every pending export completed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownTimeout;

impl std::fmt::Display for ShutdownTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("timed out before all pending exports completed")
    }
}

impl std::error::Error for ShutdownTimeout {}

/// Telemetry ingestion pipeline: one bounded buffer and one export worker
/// per signal kind, sharing a single resource identity and exporter.
///
/// Submissions never block on network I/O; sink slowness is absorbed by
/// the buffer capacity and overflow policy, and terminal export outcomes
/// surface only in the diagnostic counters.
pub struct Pipeline {
    resource: Arc<Resource>,
    lanes: Vec<Lane>,
    state: AtomicU8,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Construct a pipeline in the `Created` state. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: &PipelineConfig, resource: Resource, exporter: Arc<dyn Exporter>) -> Self {
        let resource = Arc::new(resource);
        let stats = Arc::new(PipelineStats::default());

        let lanes = Signal::all()
            .iter()
            .map(|signal| {
                Lane::new(
                    *signal,
                    SignalBuffer::new(config.buffer_capacity, config.overflow_policy),
                    config.max_batch_size,
                    config.flush_interval(),
                    config.retry.clone(),
                    resource.clone(),
                    exporter.clone(),
                    stats.clone(),
                )
            })
            .collect();

        Self {
            resource,
            lanes,
            state: AtomicU8::new(CREATED),
            stats,
        }
    }

    /// `Created → Running`: spawn the flush workers. Must be called from
    /// within a tokio runtime. Calling twice is a no-op.
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored: pipeline already started");
            return;
        }
        for lane in &self.lanes {
            lane.start();
        }
        info!(service = self.resource.service_name(), "pipeline running");
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn submit_span(&self, span: Span) -> Result<(), SubmitError> {
        self.submit(Record::Span(span))
    }

    pub fn submit_metric(&self, point: MetricPoint) -> Result<(), SubmitError> {
        self.submit(Record::Metric(point))
    }

    pub fn submit_log(&self, log: LogRecord) -> Result<(), SubmitError> {
        self.submit(Record::Log(log))
    }

    /// Route a record to its kind's buffer. Blocks only on the buffer
    /// lock, never on the sink.
    pub fn submit(&self, record: Record) -> Result<(), SubmitError> {
        if self.state() != PipelineState::Running {
            return Err(SubmitError::PipelineStopped);
        }
        let lane = self.lane(record.signal());
        lane.submit(record).map_err(|_| SubmitError::BufferFull)?;
        self.stats.record_submitted();
        Ok(())
    }

    /// Drain and export every buffer, returning once all pending exports
    /// complete or the timeout elapses. On timeout the late completions
    /// are discarded (nothing is dropped from the pipeline).
    pub async fn force_flush(&self, timeout: Duration) -> Result<(), ShutdownTimeout> {
        match self.state() {
            PipelineState::Running | PipelineState::Draining => {}
            // Nothing has been buffered yet, or everything was already
            // settled by shutdown.
            PipelineState::Created | PipelineState::Stopped => return Ok(()),
        }

        let acks: Vec<_> = self
            .lanes
            .iter()
            .filter_map(|lane| lane.request_flush())
            .collect();

        if Self::await_acks(acks, timeout).await {
            Ok(())
        } else {
            self.stats.record_flush_timeout();
            warn!("force_flush deadline elapsed with exports still pending");
            Err(ShutdownTimeout)
        }
    }

    /// `Running → Draining → Stopped`: stop accepting submissions, drain
    /// and export every buffer, then stop the workers. Records still
    /// buffered or in flight past the deadline are abandoned and counted
    /// as timeout drops.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownTimeout> {
        loop {
            match self.state.compare_exchange(
                RUNNING,
                DRAINING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(CREATED) => {
                    // Never started; nothing buffered, nothing to drain.
                    // A concurrent start() wins the race and we drain below.
                    if self
                        .state
                        .compare_exchange(CREATED, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        return Ok(());
                    }
                }
                // A concurrent or repeated shutdown already owns the drain.
                Err(_) => return Ok(()),
            }
        }

        debug!("pipeline draining");
        let acks: Vec<_> = self
            .lanes
            .iter()
            .filter_map(|lane| lane.request_shutdown())
            .collect();

        let drained = Self::await_acks(acks, timeout).await;
        if !drained {
            for lane in &self.lanes {
                lane.abandon();
            }
        }
        self.state.store(STOPPED, Ordering::SeqCst);

        let snapshot = self.stats.snapshot();
        info!(
            exported = snapshot.exported_records,
            dropped_fatal = snapshot.dropped_fatal,
            dropped_timeout = snapshot.dropped_timeout,
            dropped_overflow = snapshot.dropped_overflow,
            "pipeline stopped"
        );

        if drained {
            Ok(())
        } else {
            Err(ShutdownTimeout)
        }
    }

    fn lane(&self, signal: Signal) -> &Lane {
        // Lanes are built from Signal::all() in order
        self.lanes
            .iter()
            .find(|lane| lane.signal() == signal)
            .expect("a lane exists for every signal kind")
    }

    /// True if every ack arrived before the deadline. A closed channel
    /// counts as acked: the worker is gone and holds nothing.
    async fn await_acks(acks: Vec<oneshot::Receiver<()>>, timeout: Duration) -> bool {
        if acks.is_empty() {
            return true;
        }
        tokio::time::timeout(timeout, join_all(acks)).await.is_ok()
    }
}
