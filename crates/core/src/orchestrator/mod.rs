//! Sequential batch upload orchestrator.
//!
//! The orchestrator uploads a batch of files strictly in order, one transport
//! call at a time:
//! - **Machine**: synchronous transition table over the batch context
//! - **Runner**: a single task applying consumer events and transport results
//! - **Handle**: how consumers send events and observe snapshots
//!
//! ```text
//! idle --BATCH_START--> uploading_file --(last file ok)--> completed --RESET--> idle
//!                        |   ^    |
//!               (file ok)+---+    +--(error)--> failed --RETRY--> uploading_file
//!                        |
//!                        +--CANCEL--> cancelled --RESET--> idle
//! ```

mod config;
mod machine;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use machine::{Effect, UploadMachine};
pub use runner::{UploadHandle, UploadOrchestrator};
pub use types::{
    progress_percent, FileStatus, OrchestratorError, UploadEvent, UploadSnapshot, UploadState,
};
