//! Layered loading of the filedrop config: a TOML file, then `FILEDROP_*`
//! environment variables on top.

use std::path::Path;

use figment::{
    providers::{Data, Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Prefix for environment variable overrides, e.g. `FILEDROP_TRANSPORT__BASE_URL`.
pub const ENV_PREFIX: &str = "FILEDROP_";

/// Read `path` and apply `FILEDROP_*` overrides.
///
/// Nested keys are separated by a double underscore, so
/// `FILEDROP_ORCHESTRATOR__UPLOAD_TIMEOUT_MS=5000` sets
/// `orchestrator.upload_timeout_ms`. The result is not validated; call
/// [`validate_config`](super::validate_config) before use.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    extract(Figment::from(Toml::file(path)).merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Parse a config from TOML text alone, ignoring the environment.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let source: Data<Toml> = Toml::string(toml_str);
    extract(Figment::from(source))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[transport]
base_url = "http://localhost:3000"

[orchestrator]
cancel_signal_delay_ms = 0
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.transport.base_url, "http://localhost:3000");
        assert_eq!(config.orchestrator.cancel_signal_delay_ms, 0);
    }

    #[test]
    fn test_load_config_from_str_missing_transport() {
        let toml = r#"
[orchestrator]
cancel_signal_delay_ms = 5
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/filedrop.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[transport]
base_url = "https://uploads.example.com"
destination_path = "/v2/destinations"
timeout_secs = 120
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.transport.base_url, "https://uploads.example.com");
        assert_eq!(config.transport.destination_path, "/v2/destinations");
        assert_eq!(config.transport.timeout_secs, 120);
        assert_eq!(config.transport.field_name, "file");
        assert!(config.orchestrator.upload_timeout_ms.is_none());
    }
}
