//! Resumable upload engine.
//!
//! The host talks to an [`UploadManager`]: `create_upload` validates the
//! source and options and registers an [`UploadExecutor`], `resume` schedules
//! it on the [`WorkerPool`], `abort` stops it at the next chunk boundary.
//! Progress, success and failure are delivered through an injected
//! [`EventSink`].
//!
//! Each executor runs a single attempt. Errors are reported once, through
//! an `onError` event, and the executor is dropped from the registry; the
//! host retries by creating a new upload, which picks up the stored session
//! and continues from the last offset the server confirmed.

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod manager;
pub mod pool;
mod progress;
pub mod registry;

pub use config::{CreateOptions, EngineConfig};
pub use error::UploadError;
pub use events::{CallbackSink, EventSink, UploadEvent};
pub use executor::{ExecutorSettings, ExecutorState, UploadExecutor};
pub use manager::UploadManager;
pub use pool::WorkerPool;
pub use registry::ExecutorRegistry;
