//! Mock upload transport for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::transport::{FileHandle, UploadDestination, UploadError, UploadTransport};

/// A recorded upload call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// Name of the file that was uploaded.
    pub file_name: String,
    /// Request id of the destination it was sent to, if step 1 succeeded.
    pub request_id: Option<String>,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// How the call resolved, `None` while still in flight.
    pub outcome: Option<Result<(), UploadError>>,
}

/// Mock implementation of the UploadTransport trait.
///
/// Provides controllable behavior for testing:
/// - Track upload calls in order for assertions
/// - Simulate per-file failures and destination outages
/// - Simulate slow uploads that honor (or ignore) cancellation
///
/// # Example
///
/// ```rust,ignore
/// use filedrop_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.fail_file("b.txt", UploadError::transfer_failed("HTTP 500")).await;
///
/// let handle = UploadOrchestrator::spawn(config, Arc::new(transport.clone()));
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Recorded uploads, in call order.
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    /// Errors returned from step 2, keyed by file name.
    file_errors: Arc<RwLock<HashMap<String, UploadError>>>,
    /// If set, step 1 fails with this reason.
    destination_error: Arc<RwLock<Option<String>>>,
    /// Simulated upload duration in milliseconds.
    upload_duration_ms: Arc<RwLock<u64>>,
    /// Whether to keep going after cancellation (simulates a late result).
    ignore_cancellation: Arc<RwLock<bool>>,
    /// Calls currently between start and outcome.
    active: Arc<AtomicUsize>,
    /// Highest value `active` has reached.
    peak_active: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport where every upload succeeds.
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(RwLock::new(Vec::new())),
            file_errors: Arc::new(RwLock::new(HashMap::new())),
            destination_error: Arc::new(RwLock::new(None)),
            upload_duration_ms: Arc::new(RwLock::new(10)),
            ignore_cancellation: Arc::new(RwLock::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded uploads.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Names of uploaded files in call order.
    pub async fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .read()
            .await
            .iter()
            .map(|u| u.file_name.clone())
            .collect()
    }

    /// Get the number of upload calls performed.
    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    /// Number of recorded calls that have not resolved yet.
    pub async fn outstanding_uploads(&self) -> usize {
        self.uploads
            .read()
            .await
            .iter()
            .filter(|u| u.outcome.is_none())
            .count()
    }

    /// Most calls that were ever in flight at the same time.
    pub fn max_concurrent_uploads(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Clear recorded uploads.
    pub async fn clear_recorded_uploads(&self) {
        self.uploads.write().await.clear();
    }

    /// Make every upload of `file_name` fail with `error`.
    pub async fn fail_file(&self, file_name: &str, error: UploadError) {
        self.file_errors
            .write()
            .await
            .insert(file_name.to_string(), error);
    }

    /// Clear all configured file failures.
    pub async fn clear_failures(&self) {
        self.file_errors.write().await.clear();
    }

    /// Make step 1 fail (or succeed again with `None`).
    pub async fn set_destination_error(&self, reason: Option<&str>) {
        *self.destination_error.write().await = reason.map(str::to_string);
    }

    /// Set the simulated upload duration.
    pub async fn set_upload_duration(&self, duration: Duration) {
        *self.upload_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// When enabled, uploads run to completion even after cancellation.
    pub async fn set_ignore_cancellation(&self, ignore: bool) {
        *self.ignore_cancellation.write().await = ignore;
    }

    async fn record_outcome(&self, slot: usize, outcome: Result<(), UploadError>) {
        if let Some(upload) = self.uploads.write().await.get_mut(slot) {
            upload.outcome = Some(outcome);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn request_destination(&self) -> Result<UploadDestination, UploadError> {
        if let Some(reason) = self.destination_error.read().await.clone() {
            return Err(UploadError::destination_unavailable(reason));
        }
        let request_id = uuid::Uuid::new_v4().to_string();
        Ok(UploadDestination {
            url: format!("mock://uploads/{}", request_id),
            request_id,
        })
    }

    async fn submit(
        &self,
        file: &FileHandle,
        _destination: &UploadDestination,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let duration_ms = *self.upload_duration_ms.read().await;
        let ignore_cancellation = *self.ignore_cancellation.read().await;

        if duration_ms > 0 {
            let sleep = tokio::time::sleep(Duration::from_millis(duration_ms));
            if ignore_cancellation {
                sleep.await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                    _ = sleep => {}
                }
            }
        } else if cancel.is_cancelled() && !ignore_cancellation {
            return Err(UploadError::Cancelled);
        }

        match self.file_errors.read().await.get(&file.name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn upload(&self, file: &FileHandle, cancel: &CancellationToken) -> Result<(), UploadError> {
        let slot = {
            let mut uploads = self.uploads.write().await;
            uploads.push(RecordedUpload {
                file_name: file.name.clone(),
                request_id: None,
                started_at: Utc::now(),
                outcome: None,
            });
            uploads.len() - 1
        };
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);

        let destination = match self.request_destination().await {
            Ok(destination) => destination,
            Err(e) => {
                self.record_outcome(slot, Err(e.clone())).await;
                return Err(e);
            }
        };
        if let Some(upload) = self.uploads.write().await.get_mut(slot) {
            upload.request_id = Some(destination.request_id.clone());
        }

        let result = self.submit(file, &destination, cancel).await;
        self.record_outcome(slot, result.clone()).await;
        result
    }
}
