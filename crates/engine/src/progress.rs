//! Ordered progress reporting for one upload.
//!
//! Two producers feed the same sink: the chunk loop, after each confirmed
//! chunk, and a periodic ticker that re-sends the last confirmed offset.
//! Both go through [`ProgressReporter`], whose lock orders every emission,
//! so offsets never go backwards and nothing follows the terminal event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::events::{EventSink, UploadEvent};

struct ReporterState {
    confirmed: Option<u64>,
    closed: bool,
}

pub(crate) struct ProgressReporter {
    upload_id: String,
    total: u64,
    sink: Arc<dyn EventSink>,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub(crate) fn new(upload_id: &str, total: u64, sink: Arc<dyn EventSink>) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            total,
            sink,
            state: Mutex::new(ReporterState {
                confirmed: None,
                closed: false,
            }),
        }
    }

    /// Records a server-confirmed offset and reports it.
    ///
    /// Offsets below the last reported one are dropped.
    pub(crate) fn confirm(&self, offset: u64) {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.confirmed.is_some_and(|last| offset < last) {
            return;
        }
        let offset = offset.min(self.total);
        state.confirmed = Some(offset);
        self.sink.emit(self.progress(offset));
    }

    /// Re-sends the last confirmed offset, if any.
    pub(crate) fn tick(&self) {
        let state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if let Some(offset) = state.confirmed {
            self.sink.emit(self.progress(offset));
        }
    }

    /// Emits the terminal event. Later calls of any kind are ignored.
    pub(crate) fn finish(&self, event: UploadEvent) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;
        self.sink.emit(event);
    }

    /// Stops reporting without a terminal event.
    pub(crate) fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }

    fn progress(&self, offset: u64) -> UploadEvent {
        UploadEvent::Progress {
            upload_id: self.upload_id.clone(),
            bytes_written: offset,
            bytes_total: self.total,
        }
    }
}

/// Background task calling [`ProgressReporter::tick`] every `period`.
pub(crate) struct Ticker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn(reporter: Arc<ProgressReporter>, period: Duration) -> Self {
        let (stop, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => reporter.tick(),
                    _ = &mut stop_rx => break,
                }
            }
        });
        Self { stop, handle }
    }

    /// Stops the task and waits until it can no longer emit.
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}
