//! Per-upload state machine.
//!
//! ```text
//! Idle ──resume──▶ Queued ──worker──▶ Running ──▶ Succeeded | Failed | Aborted
//!   └──────────────────┴──────abort──────────────────────────────────▲
//! ```
//!
//! A queued executor holds no worker yet, so aborting it is as immediate as
//! aborting an idle one.
//!
//! One attempt per executor: the session is resolved once, chunks are
//! streamed until the source is exhausted or an abort is observed, and any
//! error ends the attempt. Retrying means creating a new upload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tuskit_client::{ChunkOutcome, Session, TusClient};
use tuskit_transfer::UploadDescriptor;

use crate::config::EngineConfig;
use crate::error::UploadError;
use crate::events::{EventSink, UploadEvent};
use crate::progress::{ProgressReporter, Ticker};
use crate::registry::ExecutorRegistry;

/// Lifecycle of an upload executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorState {
    Idle,
    Queued,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl ExecutorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }
}

/// Tuning knobs copied out of [`EngineConfig`] at creation time.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub chunk_size: usize,
    pub request_payload_size: usize,
    pub progress_interval: Option<Duration>,
    pub remove_fingerprint_on_success: bool,
}

impl From<&EngineConfig> for ExecutorSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            request_payload_size: config.request_payload_size,
            progress_interval: config.progress_interval(),
            remove_fingerprint_on_success: config.remove_fingerprint_on_success,
        }
    }
}

enum Outcome {
    Succeeded(String),
    Failed(UploadError),
    Aborted(Result<(), UploadError>),
}

/// Runs one upload.
pub struct UploadExecutor {
    id: String,
    descriptor: UploadDescriptor,
    client: TusClient,
    settings: ExecutorSettings,
    sink: Arc<dyn EventSink>,
    state: Mutex<ExecutorState>,
    session_url: Mutex<Option<String>>,
    offset: AtomicU64,
    cancel: CancellationToken,
    /// Set once the executor reaches a terminal state.
    done: watch::Sender<Option<Result<(), UploadError>>>,
}

impl UploadExecutor {
    pub fn new(
        id: String,
        descriptor: UploadDescriptor,
        client: TusClient,
        settings: ExecutorSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (done, _) = watch::channel(None);
        Self {
            id,
            descriptor,
            client,
            settings,
            sink,
            state: Mutex::new(ExecutorState::Idle),
            session_url: Mutex::new(None),
            offset: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            done,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.lock().unwrap()
    }

    pub fn descriptor(&self) -> &UploadDescriptor {
        &self.descriptor
    }

    /// Session URL, once the session has been resolved.
    pub fn session_url(&self) -> Option<String> {
        self.session_url.lock().unwrap().clone()
    }

    /// Last server-confirmed offset.
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Claims the executor for a run and marks it queued. Only an idle
    /// executor can be claimed, and only once.
    pub fn try_schedule(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != ExecutorState::Idle {
            return false;
        }
        *state = ExecutorState::Queued;
        true
    }

    /// Fires when the executor is aborted.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Queued → Running, once a worker picks the executor up. Fails when it
    /// was aborted while waiting.
    fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != ExecutorState::Queued {
            return false;
        }
        *state = ExecutorState::Running;
        true
    }

    /// Requests cancellation and waits for the outcome.
    ///
    /// An idle or queued executor is aborted on the spot. A running one
    /// finishes its in-flight chunk, confirms the offset with the server and
    /// stops; the result of that confirmation is returned here.
    pub async fn abort(&self) -> Result<(), UploadError> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                ExecutorState::Idle | ExecutorState::Queued => {
                    *state = ExecutorState::Aborted;
                    self.cancel.cancel();
                    self.done.send_replace(Some(Ok(())));
                    info!(upload_id = %self.id, "upload aborted before start");
                    return Ok(());
                }
                ExecutorState::Running => self.cancel.cancel(),
                ExecutorState::Aborted => return Ok(()),
                ExecutorState::Succeeded | ExecutorState::Failed => {
                    return Err(UploadError::UnknownUpload(self.id.clone()));
                }
            }
        }

        debug!(upload_id = %self.id, "abort requested, waiting for chunk boundary");
        let mut rx = self.done.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| Err(UploadError::UnknownUpload(self.id.clone())))
    }

    /// Runs the attempt to a terminal state. The executor must have been
    /// claimed with [`try_schedule`](Self::try_schedule); one aborted in the
    /// meantime returns without touching the server.
    pub async fn run(self: Arc<Self>, registry: ExecutorRegistry) {
        if !self.begin() {
            debug!(upload_id = %self.id, state = ?self.state(), "run skipped");
            return;
        }
        let reporter = Arc::new(ProgressReporter::new(
            &self.id,
            self.descriptor.total_size(),
            self.sink.clone(),
        ));
        let ticker = self
            .settings
            .progress_interval
            .map(|period| Ticker::spawn(reporter.clone(), period));

        info!(
            upload_id = %self.id,
            source = %self.descriptor.path().display(),
            size = self.descriptor.total_size(),
            "upload started"
        );
        let outcome = self.attempt(&reporter).await;

        if let Some(ticker) = ticker {
            ticker.stop().await;
        }

        match outcome {
            Outcome::Succeeded(url) => {
                self.set_state(ExecutorState::Succeeded);
                info!(upload_id = %self.id, url = %url, "upload succeeded");
                reporter.finish(UploadEvent::Success {
                    upload_id: self.id.clone(),
                    upload_url: url,
                });
                registry.remove(&self.id);
                self.done.send_replace(Some(Ok(())));
            }
            Outcome::Failed(e) => {
                self.set_state(ExecutorState::Failed);
                error!(upload_id = %self.id, error = %e, "upload failed");
                reporter.finish(UploadEvent::Error {
                    upload_id: self.id.clone(),
                    error: e.to_string(),
                });
                registry.remove(&self.id);
                self.done.send_replace(Some(Err(e)));
            }
            Outcome::Aborted(result) => {
                self.set_state(ExecutorState::Aborted);
                reporter.close();
                match &result {
                    Ok(()) => info!(upload_id = %self.id, offset = self.offset(), "upload aborted"),
                    Err(e) => warn!(upload_id = %self.id, error = %e, "abort finalize failed"),
                }
                self.done.send_replace(Some(result));
            }
        }
    }

    async fn attempt(&self, reporter: &ProgressReporter) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Aborted(Ok(()));
        }

        let mut session = match self.client.resume_or_create(&self.descriptor).await {
            Ok(session) => session,
            Err(e) => return Outcome::Failed(e.into()),
        };
        *self.session_url.lock().unwrap() = Some(session.url.clone());
        self.offset.store(session.offset, Ordering::Release);
        reporter.confirm(session.offset);

        let mut reader = match self.descriptor.reader().await {
            Ok(reader) => reader,
            Err(e) => return Outcome::Failed(e.into()),
        };
        let uploader = self
            .client
            .uploader(self.settings.chunk_size, self.settings.request_payload_size);

        loop {
            if self.cancel.is_cancelled() {
                debug!(upload_id = %self.id, offset = session.offset, "abort observed");
                return Outcome::Aborted(self.finalize(&session).await);
            }
            match uploader
                .upload_chunk(&session.url, session.offset, &mut reader)
                .await
            {
                Ok(ChunkOutcome::Advanced(offset)) => {
                    session.offset = offset;
                    self.offset.store(offset, Ordering::Release);
                    reporter.confirm(offset);
                }
                Ok(ChunkOutcome::Done) => break,
                Err(e) => return Outcome::Failed(e.into()),
            }
        }

        if let Err(e) = self.finalize(&session).await {
            return Outcome::Failed(e);
        }
        if self.settings.remove_fingerprint_on_success {
            if let Err(e) = self.client.forget(&self.descriptor) {
                warn!(upload_id = %self.id, error = %e, "failed to remove resumption record");
            }
        }
        Outcome::Succeeded(session.url)
    }

    async fn finalize(&self, session: &Session) -> Result<(), UploadError> {
        self.client.finish(session).await.map_err(UploadError::from)
    }

    fn set_state(&self, next: ExecutorState) {
        *self.state.lock().unwrap() = next;
    }
}
