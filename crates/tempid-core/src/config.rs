//! Loading engine configuration from disk.

use std::fs;
use std::path::Path;
use tempid_types::{ConfigError, EngineConfig};

/// Loads and validates the configuration at `path`.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::from_io_error(path, &e))?;
    let config: EngineConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;
    config.validate_config()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_loads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempid.json");
        fs::write(&path, r#"{"batch": {"max_ids_per_request": 5}}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.batch.max_ids_per_request, 5);
        assert_eq!(config.batch.resolve_url, "resolveTempIds");
    }

    #[test]
    fn test_parse_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempid.json");

        fs::write(&path, "{ broken").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::ParseError { .. })));

        fs::write(&path, r#"{"transport": {"timeout_secs": 0}}"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::ValidationError { .. })));
    }
}
