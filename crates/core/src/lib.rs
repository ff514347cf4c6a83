//! Sequential multi-file upload orchestration.
//!
//! A batch of files is uploaded one at a time through an [`UploadTransport`].
//! Consumers drive the batch with events (start, cancel, retry, reset) and
//! observe it through [`UploadSnapshot`]s.

pub mod config;
pub mod orchestrator;
pub mod testing;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, TransportConfig,
};
pub use orchestrator::{
    progress_percent, FileStatus, OrchestratorConfig, OrchestratorError, UploadEvent,
    UploadHandle, UploadMachine, UploadOrchestrator, UploadSnapshot, UploadState,
};
pub use transport::{
    FileHandle, FileSource, HttpTransport, TimeoutTransport, UploadDestination, UploadError,
    UploadTransport,
};
