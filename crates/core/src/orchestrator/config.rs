//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the upload orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay before a cancel request is signalled to the in-flight upload (milliseconds).
    /// The state moves to cancelled immediately either way.
    #[serde(default = "default_cancel_delay")]
    pub cancel_signal_delay_ms: u64,

    /// Upper bound for a single file upload (milliseconds).
    /// When set, the transport is wrapped so an expired upload fails with a timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_timeout_ms: Option<u64>,

    /// Capacity of the consumer event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_cancel_delay() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    32
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cancel_signal_delay_ms: default_cancel_delay(),
            upload_timeout_ms: None,
            event_buffer: default_event_buffer(),
        }
    }
}
