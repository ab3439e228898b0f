//! Client side of the tus resumable upload protocol.
//!
//! The crate has no opinion about threads or scheduling: every operation is
//! a single async call that either succeeds or returns a [`ClientError`].
//! Retrying is the caller's decision.
//!
//! # Flow
//!
//! 1. **Resolve**: [`TusClient::resume_or_create`] looks up a stored session
//!    URL, checks it with `HEAD`, and falls back to a `POST` when the server
//!    no longer knows the session.
//! 2. **Stream**: [`ChunkUploader::upload_chunk`] sends one bounded `PATCH`
//!    per call until it reports [`ChunkOutcome::Done`].
//! 3. **Finish**: [`TusClient::finish`] confirms the server-side offset.
//!
//! HTTP itself is an injected capability ([`HttpTransport`]); the
//! [`ReqwestTransport`] is the production implementation.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod options;
pub mod reqwest_transport;
pub mod transport;
pub mod uploader;

pub use client::{Session, TusClient};
pub use error::ClientError;
pub use options::UploadOptions;
pub use reqwest_transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
pub use uploader::{ChunkOutcome, ChunkUploader};
