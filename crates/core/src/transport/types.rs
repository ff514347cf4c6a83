//! Types shared by upload transports.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while uploading a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadError {
    /// Step 1 failed: no upload destination could be acquired.
    #[error("upload destination unavailable: {reason}")]
    DestinationUnavailable { reason: String },

    /// Step 2 failed for a reason other than cancellation.
    #[error("transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// The call observed its cancellation signal before completing.
    #[error("upload cancelled")]
    Cancelled,

    /// A bounded-time wrapper gave up on the call.
    #[error("upload timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

impl UploadError {
    /// Creates a destination unavailable error.
    pub fn destination_unavailable(reason: impl Into<String>) -> Self {
        Self::DestinationUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a transfer failed error.
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error came from a cancellation signal rather than a real fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Where the bytes of a file come from.
#[derive(Clone)]
pub enum FileSource {
    /// Read from disk when the file is submitted.
    Path(PathBuf),
    /// Already in memory.
    Memory(Arc<[u8]>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
        }
    }
}

/// A file selected for upload.
#[derive(Debug, Clone, Serialize)]
pub struct FileHandle {
    /// File name sent to the server and shown to consumers.
    pub name: String,
    /// MIME type of the part, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip)]
    pub source: FileSource,
}

impl FileHandle {
    /// A handle backed by a file on disk. The name is taken from the last path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            name,
            content_type: None,
            source: FileSource::Path(path),
        }
    }

    /// A handle backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            source: FileSource::Memory(data.into()),
        }
    }

    /// Sets the MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Loads the file contents.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, UploadError> {
        match &self.source {
            FileSource::Memory(data) => Ok(data.to_vec()),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                UploadError::transfer_failed(format!("failed to read {}: {}", path.display(), e))
            }),
        }
    }
}

/// An upload destination handed out by step 1 of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    /// Opaque identifier of this upload request.
    pub request_id: String,
    /// Absolute address the file is submitted to.
    pub url: String,
}

/// A transport that performs the two-step upload protocol for one file.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Returns the name of this transport implementation.
    fn name(&self) -> &str;

    /// Step 1: acquire a destination for the next file.
    async fn request_destination(&self) -> Result<UploadDestination, UploadError>;

    /// Step 2: submit the file to the destination.
    ///
    /// Implementations must observe `cancel` while the request is in flight and
    /// return [`UploadError::Cancelled`] promptly once it fires.
    async fn submit(
        &self,
        file: &FileHandle,
        destination: &UploadDestination,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;

    /// Uploads one file: acquire a destination, then submit to it.
    async fn upload(&self, file: &FileHandle, cancel: &CancellationToken) -> Result<(), UploadError> {
        let destination = self.request_destination().await?;
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        self.submit(file, &destination, cancel).await
    }
}
