use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::utils::error::AppError;

/// One progress notification from the report worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub label: String,
}

/// Worker-side handle. Cloneable and thread-safe; sending never blocks, and
/// a closed channel is ignored because reporting is advisory.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Creates a reporter together with the receiving end it feeds.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, percent: u8, label: impl Into<String>) {
        let event = ProgressEvent {
            percent: percent.min(100),
            label: label.into(),
        };
        let _ = self.tx.send(event);
    }
}

/// Receiving side of the bridge: where drained progress ends up.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, percent: u8, label: &str);
    async fn on_finish(&self, success: bool);
}

#[async_trait]
impl ProgressSink for Box<dyn ProgressSink> {
    async fn on_progress(&self, percent: u8, label: &str) {
        (**self).on_progress(percent, label).await;
    }

    async fn on_finish(&self, success: bool) {
        (**self).on_finish(success).await;
    }
}

/// Sink for runs without a page overlay: progress goes to the log.
#[derive(Debug, Default)]
pub struct LogProgressSink;

#[async_trait]
impl ProgressSink for LogProgressSink {
    async fn on_progress(&self, percent: u8, label: &str) {
        debug!("Report progress {}%: {}", percent, label);
    }

    async fn on_finish(&self, success: bool) {
        debug!("Report finished (success: {})", success);
    }
}

const POLL_TICK: Duration = Duration::from_millis(150);
const POLL_START_PERCENT: u8 = 5;
const POLL_CAP_PERCENT: u8 = 99;

/// Relays progress from a blocking report task to a sink without letting
/// either side stall the other. The worker runs on the blocking pool and
/// only ever sends into the channel; the driving task drains events at its
/// own cadence and joins the worker exactly once.
pub struct ProgressBridge<S: ProgressSink> {
    sink: S,
}

impl<S: ProgressSink> ProgressBridge<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs a task that reports its own progress through the handed-in
    /// reporter. Events are forwarded in order; once the task completes the
    /// bridge reports 100 and the terminal state.
    pub async fn run_reported<T, F>(&self, task: F) -> crate::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ProgressReporter) -> T + Send + 'static,
    {
        let (reporter, mut rx) = ProgressReporter::channel();
        let handle = tokio::task::spawn_blocking(move || task(reporter));

        // The channel closes when the worker drops its reporter, so this
        // drains every buffered event before the join below.
        while let Some(event) = rx.recv().await {
            self.sink.on_progress(event.percent, &event.label).await;
        }

        match handle.await {
            Ok(output) => {
                self.sink.on_progress(100, "Report complete").await;
                self.sink.on_finish(true).await;
                Ok(output)
            }
            Err(e) => {
                self.sink.on_finish(false).await;
                Err(AppError::Report(format!("report task failed: {}", e)))
            }
        }
    }

    /// Runs a task that cannot report on its own. The bridge synthesizes a
    /// smoothed progression, bounded below 100 until the task really
    /// finishes; the underlying data is unaffected either way.
    pub async fn run_polled<T, F>(&self, task: F) -> crate::Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let mut handle = tokio::task::spawn_blocking(task);
        let mut percent = POLL_START_PERCENT;

        self.sink
            .on_progress(percent, &format!("Building report... {}%", percent))
            .await;

        loop {
            tokio::select! {
                joined = &mut handle => {
                    return match joined {
                        Ok(output) => {
                            self.sink.on_progress(100, "Report complete").await;
                            self.sink.on_finish(true).await;
                            Ok(output)
                        }
                        Err(e) => {
                            self.sink.on_finish(false).await;
                            Err(AppError::Report(format!("report task failed: {}", e)))
                        }
                    };
                }
                _ = tokio::time::sleep(POLL_TICK) => {
                    percent = (percent + 1).min(POLL_CAP_PERCENT);
                    self.sink
                        .on_progress(percent, &format!("Building report... {}%", percent))
                        .await;
                }
            }
        }
    }
}
