//! CLI configuration loading.
//!
//! Reads an [`EngineConfig`] from JSON. Without `--config` the file at
//! `<config dir>/tuskit/config.json` is used when it exists.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tuskit_engine::EngineConfig;

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    tuskit_store::config_dir().map(|d| d.join("tuskit").join("config.json"))
}

/// Loads the configuration. An explicitly named file must exist; the
/// default one is optional.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match explicit {
        Some(path) => read(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read(&path),
            _ => Ok(EngineConfig::default()),
        },
    }
}

fn read(path: &Path) -> anyhow::Result<EngineConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    if data.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"chunk_size": 65536, "workers": 3}"#).unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.workers, 3);
        assert_eq!(config.progress_interval_ms, 500);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.json"))).is_err());
    }

    #[test]
    fn empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "").unwrap();
        assert_eq!(load(Some(&path)).unwrap(), EngineConfig::default());
    }
}
