use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::buffer::{BufferFull, SignalBuffer};
use crate::export::{with_retry, Exporter, RetryConfig};
use crate::record::{Batch, Record, Resource};
use crate::signal::Signal;
use crate::stats::PipelineStats;

pub(crate) enum LaneCommand {
    Flush { done: oneshot::Sender<()> },
    Shutdown { done: oneshot::Sender<()> },
}

fn lock(buffer: &Mutex<SignalBuffer>) -> MutexGuard<'_, SignalBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One signal kind's half of the pipeline: the shared buffer plus the
/// handle to the worker task that drains it. The worker serializes
/// drain→export for its kind; lanes for different kinds run concurrently.
pub(crate) struct Lane {
    signal: Signal,
    buffer: Arc<Mutex<SignalBuffer>>,
    wakeup: Arc<Notify>,
    commands: mpsc::UnboundedSender<LaneCommand>,
    in_flight: Arc<AtomicU64>,
    max_batch_size: usize,
    stats: Arc<PipelineStats>,
    worker: Mutex<Option<LaneWorker>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        signal: Signal,
        buffer: SignalBuffer,
        max_batch_size: usize,
        flush_interval: Duration,
        retry: RetryConfig,
        resource: Arc<Resource>,
        exporter: Arc<dyn Exporter>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(buffer));
        let wakeup = Arc::new(Notify::new());
        let in_flight = Arc::new(AtomicU64::new(0));
        let (commands, command_rx) = mpsc::unbounded_channel();

        let max_batch_size = max_batch_size.max(1);
        let worker = LaneWorker {
            signal,
            buffer: buffer.clone(),
            wakeup: wakeup.clone(),
            commands: command_rx,
            in_flight: in_flight.clone(),
            max_batch_size,
            flush_interval,
            retry,
            resource,
            exporter,
            stats: stats.clone(),
        };

        Self {
            signal,
            buffer,
            wakeup,
            commands,
            in_flight,
            max_batch_size,
            stats,
            worker: Mutex::new(Some(worker)),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn signal(&self) -> Signal {
        self.signal
    }

    /// Spawn the worker task. Must run inside a tokio runtime.
    pub(crate) fn start(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let handle = tokio::spawn(worker.run());
            *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
    }

    /// Append to the buffer, waking the worker once a full batch is ready.
    /// Holds only the buffer lock; never touches the network.
    pub(crate) fn submit(&self, record: Record) -> Result<(), BufferFull> {
        let len = {
            let mut buffer = lock(&self.buffer);
            if buffer.push(record)?.is_some() {
                self.stats.record_overflow_drop();
            }
            buffer.len()
        };
        if len >= self.max_batch_size {
            self.wakeup.notify_one();
        }
        Ok(())
    }

    /// Ask the worker to drain until empty. None if the worker is gone.
    pub(crate) fn request_flush(&self) -> Option<oneshot::Receiver<()>> {
        let (done, rx) = oneshot::channel();
        self.commands.send(LaneCommand::Flush { done }).ok()?;
        Some(rx)
    }

    /// Ask the worker to drain until empty and then exit
    pub(crate) fn request_shutdown(&self) -> Option<oneshot::Receiver<()>> {
        let (done, rx) = oneshot::channel();
        self.commands.send(LaneCommand::Shutdown { done }).ok()?;
        Some(rx)
    }

    /// Abort the worker past a shutdown deadline. Whatever is still
    /// buffered or in flight is counted as a timeout drop; a late export
    /// outcome is discarded along with the task.
    pub(crate) fn abandon(&self) {
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        let pending = self.in_flight.swap(0, Ordering::SeqCst) + lock(&self.buffer).clear() as u64;
        if pending > 0 {
            self.stats.record_timeout_drop(pending);
            warn!(
                signal = %self.signal,
                records = pending,
                "abandoned records past shutdown deadline"
            );
        }
    }
}

struct LaneWorker {
    signal: Signal,
    buffer: Arc<Mutex<SignalBuffer>>,
    wakeup: Arc<Notify>,
    commands: mpsc::UnboundedReceiver<LaneCommand>,
    in_flight: Arc<AtomicU64>,
    max_batch_size: usize,
    flush_interval: Duration,
    retry: RetryConfig,
    resource: Arc<Resource>,
    exporter: Arc<dyn Exporter>,
    stats: Arc<PipelineStats>,
}

impl LaneWorker {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick resolves immediately; consume it so the timer
        // measures elapsed time from here.
        ticker.tick().await;

        debug!(signal = %self.signal, "lane worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                _ = self.wakeup.notified() => {
                    self.flush_once().await;
                    ticker.reset();
                    // More than one batch may have accumulated while the
                    // export was in flight.
                    if lock(&self.buffer).len() >= self.max_batch_size {
                        self.wakeup.notify_one();
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(LaneCommand::Flush { done }) => {
                        self.flush_until_empty().await;
                        let _ = done.send(());
                        ticker.reset();
                    }
                    Some(LaneCommand::Shutdown { done }) => {
                        self.flush_until_empty().await;
                        debug!(signal = %self.signal, "lane drained, worker stopping");
                        let _ = done.send(());
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    /// Drain one capped batch and deliver it, reporting the terminal
    /// outcome to the stats counters only.
    async fn flush_once(&self) -> usize {
        let records = lock(&self.buffer).drain(self.max_batch_size);
        if records.is_empty() {
            return 0;
        }

        let count = records.len();
        let batch = Batch::new(self.signal, self.resource.clone(), records);
        self.in_flight.store(count as u64, Ordering::SeqCst);

        let result = with_retry(&self.retry, || async {
            let result = self.exporter.export(&batch).await;
            if result.is_err() {
                self.stats.record_export_attempt_failure();
            }
            result
        })
        .await;

        self.in_flight.store(0, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.stats.record_exported(count as u64);
                debug!(signal = %self.signal, records = count, "batch delivered");
            }
            Err(e) => {
                self.stats.record_fatal_drop(count as u64);
                warn!(
                    signal = %self.signal,
                    records = count,
                    error = %e,
                    "batch dropped after exhausting delivery attempts"
                );
            }
        }

        count
    }

    async fn flush_until_empty(&self) {
        while self.flush_once().await > 0 {}
    }
}
