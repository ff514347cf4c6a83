//! Testing utilities and mock implementations.
//!
//! This module provides a mock implementation of the upload transport,
//! allowing the orchestrator to be exercised without a real server.
//!
//! # Example
//!
//! ```rust,ignore
//! use filedrop_core::testing::{fixtures, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport.set_upload_duration(Duration::from_millis(5)).await;
//!
//! let handle = UploadOrchestrator::spawn(OrchestratorConfig::default(), Arc::new(transport.clone()));
//! handle.start_batch(fixtures::files(3)).await?;
//! ```

mod mock_transport;

pub use mock_transport::{MockTransport, RecordedUpload};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::transport::FileHandle;

    /// Create an in-memory file with some content.
    pub fn file(name: &str) -> FileHandle {
        FileHandle::from_bytes(name, format!("contents of {}", name).into_bytes())
            .with_content_type("text/plain")
    }

    /// Create a batch of `count` in-memory files named `file0.txt`, `file1.txt`, ...
    pub fn files(count: usize) -> Vec<FileHandle> {
        (0..count).map(|i| file(&format!("file{}.txt", i))).collect()
    }
}
