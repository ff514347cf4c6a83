//! Bounded-time wrapper around another transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{FileHandle, UploadDestination, UploadError, UploadTransport};

/// Gives every upload a deadline. On expiry the inner call is cancelled and
/// the upload resolves with [`UploadError::TimedOut`].
pub struct TimeoutTransport {
    inner: Arc<dyn UploadTransport>,
    timeout: Duration,
}

impl TimeoutTransport {
    /// Wrap `inner` so each upload takes at most `timeout`.
    pub fn new(inner: Arc<dyn UploadTransport>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn timed_out(&self) -> UploadError {
        UploadError::TimedOut {
            after_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl UploadTransport for TimeoutTransport {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn request_destination(&self) -> Result<UploadDestination, UploadError> {
        tokio::time::timeout(self.timeout, self.inner.request_destination())
            .await
            .map_err(|_| self.timed_out())?
    }

    async fn submit(
        &self,
        file: &FileHandle,
        destination: &UploadDestination,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let child = cancel.child_token();
        match tokio::time::timeout(self.timeout, self.inner.submit(file, destination, &child)).await
        {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                Err(self.timed_out())
            }
        }
    }

    async fn upload(&self, file: &FileHandle, cancel: &CancellationToken) -> Result<(), UploadError> {
        // One deadline covers both steps.
        let child = cancel.child_token();
        match tokio::time::timeout(self.timeout, self.inner.upload(file, &child)).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                warn!(
                    "Upload of {} timed out after {:?} ({})",
                    file.name,
                    self.timeout,
                    self.inner.name()
                );
                Err(self.timed_out())
            }
        }
    }
}
