use reqwest::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Transport section exists (enforced by serde)
/// - transport.base_url is an absolute http(s) URL
/// - transport.destination_path starts with '/'
/// - transport.field_name is not empty
/// - transport.timeout_secs and orchestrator.upload_timeout_ms are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let transport = &config.transport;

    let url = Url::parse(&transport.base_url).map_err(|e| {
        ConfigError::ValidationError(format!(
            "transport.base_url is not a valid URL ({}): {}",
            transport.base_url, e
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "transport.base_url must use http or https, got {}",
            url.scheme()
        )));
    }

    if !transport.destination_path.starts_with('/') {
        return Err(ConfigError::ValidationError(
            "transport.destination_path must start with '/'".to_string(),
        ));
    }

    if transport.field_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "transport.field_name cannot be empty".to_string(),
        ));
    }

    if transport.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transport.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.upload_timeout_ms == Some(0) {
        return Err(ConfigError::ValidationError(
            "orchestrator.upload_timeout_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrchestratorConfig, TransportConfig};

    fn config_with(transport: TransportConfig) -> Config {
        Config {
            transport,
            orchestrator: OrchestratorConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config_with(TransportConfig::new("http://localhost:3000"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_relative_base_url_fails() {
        let config = config_with(TransportConfig::new("localhost/api"));
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_non_http_scheme_fails() {
        let config = config_with(TransportConfig::new("ftp://files.example.com"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_validate_destination_path_without_slash_fails() {
        let mut transport = TransportConfig::new("http://localhost:3000");
        transport.destination_path = "api/getUrl".to_string();
        let result = validate_config(&config_with(transport));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_field_name_fails() {
        let mut transport = TransportConfig::new("http://localhost:3000");
        transport.field_name = "  ".to_string();
        assert!(validate_config(&config_with(transport)).is_err());
    }

    #[test]
    fn test_validate_zero_timeouts_fail() {
        let mut transport = TransportConfig::new("http://localhost:3000");
        transport.timeout_secs = 0;
        assert!(validate_config(&config_with(transport)).is_err());

        let mut config = config_with(TransportConfig::new("http://localhost:3000"));
        config.orchestrator.upload_timeout_ms = Some(0);
        assert!(validate_config(&config).is_err());
    }
}
