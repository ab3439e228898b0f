//! Host command surface.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tuskit_client::{HttpTransport, ReqwestTransport, TusClient};
use tuskit_store::{FileUrlStore, MemoryUrlStore, UrlStore};
use tuskit_transfer::UploadDescriptor;

use crate::config::{CreateOptions, EngineConfig};
use crate::error::UploadError;
use crate::events::EventSink;
use crate::executor::{ExecutorSettings, ExecutorState, UploadExecutor};
use crate::pool::WorkerPool;
use crate::registry::ExecutorRegistry;

/// Entry point for hosts: registers uploads and routes resume and abort
/// commands to their executors.
pub struct UploadManager {
    config: EngineConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn UrlStore>,
    sink: Arc<dyn EventSink>,
    registry: ExecutorRegistry,
    pool: WorkerPool,
}

impl UploadManager {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn UrlStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let pool = WorkerPool::new(config.workers);
        Self {
            config,
            transport,
            store,
            sink,
            registry: ExecutorRegistry::new(),
            pool,
        }
    }

    /// Builds a manager with the `reqwest` transport and the store named by
    /// `config.store_path` (in memory when unset).
    pub fn from_config(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, UploadError> {
        let transport =
            ReqwestTransport::new().map_err(|e| UploadError::Transport(e.to_string()))?;
        let store: Arc<dyn UrlStore> = match &config.store_path {
            Some(path) => Arc::new(FileUrlStore::open(path.clone())?),
            None => Arc::new(MemoryUrlStore::new()),
        };
        Ok(Self::new(config, Arc::new(transport), store, sink))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Registers an upload of `locator` and returns its id. Nothing is sent
    /// until [`resume`](Self::resume).
    pub fn create_upload(
        &self,
        locator: &str,
        options: &CreateOptions,
    ) -> Result<String, UploadError> {
        let upload_options = options.upload_options()?;
        let descriptor = UploadDescriptor::open(locator, options.metadata.clone())?;

        let id = uuid::Uuid::new_v4().to_string();
        let client = TusClient::new(self.transport.clone(), self.store.clone(), upload_options);
        let executor = Arc::new(UploadExecutor::new(
            id.clone(),
            descriptor,
            client,
            ExecutorSettings::from(&self.config),
            self.sink.clone(),
        ));
        if !self.registry.register(executor) {
            warn!(upload_id = %id, "upload id already registered");
            return Err(UploadError::InvalidOption(format!("duplicate upload id {id}")));
        }

        info!(upload_id = %id, source = %locator, endpoint = %options.endpoint, "upload registered");
        Ok(id)
    }

    /// Schedules the upload on a worker.
    ///
    /// Returns `false` for unknown ids and for executors that are already
    /// queued, running or finished. Must be called from within a tokio
    /// runtime.
    pub fn resume(&self, id: &str) -> bool {
        match self.schedule(id) {
            Ok(()) => true,
            Err(e) => {
                debug!(upload_id = %id, error = %e, "resume refused");
                false
            }
        }
    }

    /// [`create_upload`](Self::create_upload) followed by
    /// [`resume`](Self::resume). Fails if the new upload could not be
    /// scheduled.
    pub fn start(&self, locator: &str, options: &CreateOptions) -> Result<String, UploadError> {
        let id = self.create_upload(locator, options)?;
        self.schedule(&id)?;
        Ok(id)
    }

    fn schedule(&self, id: &str) -> Result<(), UploadError> {
        let executor = self
            .registry
            .get(id)
            .ok_or_else(|| UploadError::UnknownUpload(id.to_string()))?;
        if !executor.try_schedule() {
            return Err(UploadError::InvalidOption(format!(
                "upload {id} is {:?}",
                executor.state()
            )));
        }
        let cancel = executor.cancellation();
        self.pool
            .spawn_cancellable(cancel, executor.run(self.registry.clone()));
        Ok(())
    }

    /// Aborts the upload. For a running upload this waits for the in-flight
    /// chunk and reports whether the server confirmed the final offset.
    pub async fn abort(&self, id: &str) -> Result<(), UploadError> {
        let executor = self
            .registry
            .get(id)
            .ok_or_else(|| UploadError::UnknownUpload(id.to_string()))?;
        executor.abort().await
    }

    /// Drops a registered upload, typically one that was aborted. A queued
    /// or running upload cannot be removed.
    pub fn remove(&self, id: &str) -> bool {
        match self.registry.get(id) {
            Some(executor)
                if !matches!(
                    executor.state(),
                    ExecutorState::Queued | ExecutorState::Running
                ) =>
            {
                self.registry.remove(id).is_some()
            }
            _ => false,
        }
    }

    pub fn state(&self, id: &str) -> Option<ExecutorState> {
        self.registry.get(id).map(|e| e.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UploadEvent;
    use tokio::sync::mpsc;
    use tuskit_client::memory::MemoryServer;

    fn manager() -> (UploadManager, Arc<MemoryServer>, mpsc::UnboundedReceiver<UploadEvent>) {
        let server = Arc::new(MemoryServer::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let config = EngineConfig {
            chunk_size: 4,
            request_payload_size: 4,
            progress_interval_ms: 0,
            workers: 2,
            store_path: None,
            ..Default::default()
        };
        let manager = UploadManager::new(
            config,
            server.clone(),
            Arc::new(MemoryUrlStore::new()),
            Arc::new(tx),
        );
        (manager, server, rx)
    }

    #[test]
    fn construction_errors_register_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _, _) = manager();

        let missing = dir.path().join("missing.bin");
        let err = manager
            .create_upload(
                missing.to_str().unwrap(),
                &CreateOptions::new("http://tus.test/files/"),
            )
            .unwrap_err();
        assert!(matches!(err, UploadError::SourceNotFound(_)));

        let present = dir.path().join("present.bin");
        std::fs::write(&present, b"x").unwrap();
        let err = manager
            .create_upload(present.to_str().unwrap(), &CreateOptions::new("::"))
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidEndpoint(_)));

        assert!(manager.registry().is_empty());
    }

    #[test]
    fn malformed_metadata_key_is_rejected_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let (manager, server, _) = manager();

        for key in ["file name", "a,b", ""] {
            let options = CreateOptions::new("http://tus.test/files/").metadata(key, "x");
            let err = manager
                .create_upload(path.to_str().unwrap(), &options)
                .unwrap_err();
            assert!(matches!(err, UploadError::InvalidOption(_)), "{key:?}: {err:?}");
        }
        assert!(manager.registry().is_empty());
        assert!(server.requests().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let (manager, _, _) = manager();
        let options = CreateOptions::new("http://tus.test/files/");

        let a = manager.create_upload(path.to_str().unwrap(), &options).unwrap();
        let b = manager.create_upload(path.to_str().unwrap(), &options).unwrap();
        assert_ne!(a, b);
        assert_eq!(manager.registry().len(), 2);
        assert_eq!(manager.state(&a), Some(ExecutorState::Idle));
    }

    #[tokio::test]
    async fn unknown_ids() {
        let (manager, _, _) = manager();
        assert!(!manager.resume("nope"));
        assert!(matches!(
            manager.schedule("nope"),
            Err(UploadError::UnknownUpload(_))
        ));
        assert!(!manager.remove("nope"));
        assert!(matches!(
            manager.abort("nope").await,
            Err(UploadError::UnknownUpload(_))
        ));
    }

    #[tokio::test]
    async fn start_runs_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let (manager, server, mut rx) = manager();

        let options = CreateOptions::new("http://tus.test/files/").metadata("filename", "a.bin");
        let id = manager.start(path.to_str().unwrap(), &options).unwrap();

        let url = loop {
            match rx.recv().await.unwrap() {
                UploadEvent::Success { upload_id, upload_url } => {
                    assert_eq!(upload_id, id);
                    break upload_url;
                }
                UploadEvent::Error { error, .. } => panic!("upload failed: {error}"),
                UploadEvent::Progress { .. } => {}
            }
        };

        let upload = server.upload(&url).unwrap();
        assert_eq!(upload.data, b"0123456789");
        assert_eq!(upload.metadata["filename"], "a.bin");
        assert!(!manager.resume(&id));
    }

    #[tokio::test]
    async fn aborted_upload_can_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let (manager, _, _) = manager();

        let id = manager
            .create_upload(path.to_str().unwrap(), &CreateOptions::new("http://tus.test/files/"))
            .unwrap();
        manager.abort(&id).await.unwrap();
        assert_eq!(manager.state(&id), Some(ExecutorState::Aborted));
        assert!(!manager.resume(&id));
        assert!(matches!(
            manager.schedule(&id),
            Err(UploadError::InvalidOption(_))
        ));
        assert!(manager.remove(&id));
        assert!(manager.registry().is_empty());
    }
}
