//! Types for the upload orchestrator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::transport::{FileHandle, UploadError};

/// Errors returned to consumers that send events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The event is not accepted in the current state.
    #[error("event {event} is not valid in state {state}")]
    InvalidTransition { state: UploadState, event: &'static str },

    /// A batch must contain at least one file.
    #[error("cannot start an empty batch")]
    EmptyBatch,

    /// The orchestrator task has stopped.
    #[error("upload orchestrator is closed")]
    Closed,
}

/// Externally observable state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// No batch selected.
    Idle,
    /// A file of the batch is being uploaded.
    UploadingFile,
    /// Every file of the batch was uploaded. Requires a reset.
    Completed,
    /// A file failed; the batch can be retried.
    Failed,
    /// The batch was cancelled. Requires a reset.
    Cancelled,
}

impl UploadState {
    /// Returns the string representation for logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::UploadingFile => "uploading_file",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        }
    }

    /// Returns true once a batch attempt has reached one of its three outcomes.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            UploadState::Completed | UploadState::Failed | UploadState::Cancelled
        )
    }

    /// Short message shown to users for this state.
    pub fn status_message(&self) -> &'static str {
        match self {
            UploadState::Idle => "",
            UploadState::UploadingFile => "uploading files...",
            UploadState::Failed => "upload failed.",
            UploadState::Cancelled => "upload cancelled.",
            UploadState::Completed => "upload completed.",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events a consumer sends into the orchestrator.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Start uploading a new batch. Valid only from idle.
    BatchStart { files: Vec<FileHandle> },
    /// Abort the upload in progress. Valid only while uploading.
    Cancel,
    /// Re-attempt a failed batch from its first file. Valid only from failed.
    Retry,
    /// Discard the batch. Valid only from completed or cancelled.
    Reset,
}

impl UploadEvent {
    /// Event name used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadEvent::BatchStart { .. } => "BATCH_START",
            UploadEvent::Cancel => "CANCEL",
            UploadEvent::Retry => "RETRY",
            UploadEvent::Reset => "RESET",
        }
    }
}

/// Display status of one file in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// Upload progress as a percentage.
///
/// Derived from the current index and batch length only; it is never stored.
/// The first file of an attempt reports 0 and a cancelled batch reports 0.
pub fn progress_percent(state: UploadState, current_file_index: Option<usize>, len: usize) -> f64 {
    match state {
        UploadState::Idle | UploadState::Cancelled => 0.0,
        UploadState::Completed => 100.0,
        UploadState::UploadingFile | UploadState::Failed => match current_file_index {
            Some(idx) if idx > 0 && len > 0 => 100.0 * (idx + 1) as f64 / len as f64,
            _ => 0.0,
        },
    }
}

/// Read-only view of the orchestrator handed to consumers.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSnapshot {
    pub state: UploadState,
    pub files: Vec<FileHandle>,
    /// `None` before a batch starts.
    pub current_file_index: Option<usize>,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    /// Present only in the failed state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<UploadError>,
    /// When the current batch attempt started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for UploadSnapshot {
    fn default() -> Self {
        Self {
            state: UploadState::Idle,
            files: Vec::new(),
            current_file_index: None,
            progress: 0.0,
            last_error: None,
            started_at: None,
        }
    }
}

impl UploadSnapshot {
    pub fn can_cancel(&self) -> bool {
        self.state == UploadState::UploadingFile
    }

    pub fn can_retry(&self) -> bool {
        self.state == UploadState::Failed
    }

    pub fn can_reset(&self) -> bool {
        matches!(self.state, UploadState::Completed | UploadState::Cancelled)
    }

    /// File selection is only accepted while idle.
    pub fn accepts_files(&self) -> bool {
        self.state == UploadState::Idle
    }

    /// "Uploading file i of N" while a file is in flight.
    pub fn label(&self) -> Option<String> {
        match (self.state, self.current_file_index) {
            (UploadState::UploadingFile, Some(idx)) => Some(format!(
                "Uploading file {} of {}",
                idx + 1,
                self.files.len()
            )),
            _ => None,
        }
    }

    /// Per-file status, in batch order.
    pub fn file_statuses(&self) -> Vec<FileStatus> {
        (0..self.files.len())
            .map(|i| match (self.state, self.current_file_index) {
                (UploadState::Completed, _) => FileStatus::Uploaded,
                (UploadState::UploadingFile, Some(idx)) if i < idx => FileStatus::Uploaded,
                (UploadState::UploadingFile, Some(idx)) if i == idx => FileStatus::Uploading,
                (UploadState::Failed, Some(idx)) if i < idx => FileStatus::Uploaded,
                (UploadState::Failed, Some(idx)) if i == idx => FileStatus::Failed,
                _ => FileStatus::Pending,
            })
            .collect()
    }
}
