//! Synchronous upload state machine.
//!
//! Holds the batch context and applies the transition table. It performs no
//! I/O: every transition returns the [`Effect`] the runtime has to carry out.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::transport::{FileHandle, UploadError};

use super::types::{progress_percent, OrchestratorError, UploadEvent, UploadSnapshot, UploadState};

/// Side effect requested by a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Open a new attempt and upload its first file.
    StartAttempt { file: FileHandle },
    /// Upload the next file of the current attempt.
    DispatchNext { index: usize, file: FileHandle },
    /// Signal the in-flight upload to abort.
    SignalCancel,
}

/// The upload state machine and its batch context.
#[derive(Debug)]
pub struct UploadMachine {
    state: UploadState,
    files: Vec<FileHandle>,
    current_file_index: Option<usize>,
    last_error: Option<UploadError>,
    started_at: Option<DateTime<Utc>>,
}

impl Default for UploadMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadMachine {
    /// Create a machine in the idle state with an empty context.
    pub fn new() -> Self {
        Self {
            state: UploadState::Idle,
            files: Vec::new(),
            current_file_index: None,
            last_error: None,
            started_at: None,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn current_file_index(&self) -> Option<usize> {
        self.current_file_index
    }

    pub fn last_error(&self) -> Option<&UploadError> {
        self.last_error.as_ref()
    }

    pub fn progress(&self) -> f64 {
        progress_percent(self.state, self.current_file_index, self.files.len())
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        UploadSnapshot {
            state: self.state,
            files: self.files.clone(),
            current_file_index: self.current_file_index,
            progress: self.progress(),
            last_error: self.last_error.clone(),
            started_at: self.started_at,
        }
    }

    /// Apply a consumer event.
    pub fn apply(&mut self, event: UploadEvent) -> Result<Option<Effect>, OrchestratorError> {
        let kind = event.kind();
        let from = self.state;

        let effect = match (self.state, event) {
            (UploadState::Idle, UploadEvent::BatchStart { files }) => {
                if files.is_empty() {
                    return Err(OrchestratorError::EmptyBatch);
                }
                self.files = files;
                Some(self.begin_attempt())
            }
            (UploadState::UploadingFile, UploadEvent::Cancel) => {
                self.state = UploadState::Cancelled;
                Some(Effect::SignalCancel)
            }
            (UploadState::Failed, UploadEvent::Retry) => {
                self.last_error = None;
                Some(self.begin_attempt())
            }
            (UploadState::Completed | UploadState::Cancelled, UploadEvent::Reset) => {
                *self = Self::new();
                None
            }
            (state, _) => {
                return Err(OrchestratorError::InvalidTransition { state, event: kind });
            }
        };

        info!("Upload {} -> {} ({})", from, self.state, kind);
        Ok(effect)
    }

    /// The in-flight upload succeeded: advance to the next file or complete.
    pub fn on_upload_succeeded(&mut self) -> Result<Option<Effect>, OrchestratorError> {
        let idx = self.uploading_index("UPLOAD_SUCCEEDED")?;

        if idx + 1 >= self.files.len() {
            self.state = UploadState::Completed;
            info!("Upload batch completed ({} files)", self.files.len());
            return Ok(None);
        }

        let next = idx + 1;
        self.current_file_index = Some(next);
        info!(
            "File {} of {} uploaded, progress {:.1}%",
            idx + 1,
            self.files.len(),
            self.progress()
        );
        Ok(Some(Effect::DispatchNext {
            index: next,
            file: self.files[next].clone(),
        }))
    }

    /// The in-flight upload failed. A cancellation routes to cancelled, anything else to failed.
    pub fn on_upload_failed(&mut self, error: UploadError) -> Result<(), OrchestratorError> {
        let idx = self.uploading_index("UPLOAD_FAILED")?;

        if error.is_cancelled() {
            self.state = UploadState::Cancelled;
            info!("Upload {} -> {} (transport cancelled)", UploadState::UploadingFile, self.state);
            return Ok(());
        }

        self.state = UploadState::Failed;
        info!(
            "Upload {} -> {} at file {} of {}: {}",
            UploadState::UploadingFile,
            self.state,
            idx + 1,
            self.files.len(),
            error
        );
        self.last_error = Some(error);
        Ok(())
    }

    fn begin_attempt(&mut self) -> Effect {
        self.state = UploadState::UploadingFile;
        self.current_file_index = Some(0);
        self.started_at = Some(Utc::now());
        Effect::StartAttempt {
            file: self.files[0].clone(),
        }
    }

    fn uploading_index(&self, signal: &'static str) -> Result<usize, OrchestratorError> {
        match (self.state, self.current_file_index) {
            (UploadState::UploadingFile, Some(idx)) => Ok(idx),
            (state, _) => Err(OrchestratorError::InvalidTransition {
                state,
                event: signal,
            }),
        }
    }
}
