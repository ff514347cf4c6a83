use serde::{Deserialize, Serialize};

pub use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub transport: TransportConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Server URL (e.g., "http://localhost:3000")
    pub base_url: String,
    /// Path of the endpoint that hands out upload destinations
    #[serde(default = "default_destination_path")]
    pub destination_path: String,
    /// Multipart field the file is sent under
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            destination_path: default_destination_path(),
            field_name: default_field_name(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_destination_path() -> String {
    "/api/getUrl".to_string()
}

fn default_field_name() -> String {
    "file".to_string()
}

fn default_timeout() -> u64 {
    30
}
