//! Analyzer configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read options file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid options JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerOptions {
    /// Directory `package:` hrefs resolve against.
    pub package_root: PathBuf,
    /// Initial indentation mode for text nodes.
    pub preserve_indentation: bool,
    /// Run discovery for independent files on the rayon pool.
    pub parallel_discovery: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            package_root: PathBuf::from("packages"),
            preserve_indentation: false,
            parallel_discovery: true,
        }
    }
}

impl AnalyzerOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let options = AnalyzerOptions::from_json(r#"{"preserveIndentation": true}"#).unwrap();
        assert!(options.preserve_indentation);
        assert!(options.parallel_discovery);
        assert_eq!(options.package_root, PathBuf::from("packages"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"packageRoot": "/deps", "parallelDiscovery": false}}"#).unwrap();
        let options = AnalyzerOptions::load(file.path()).unwrap();
        assert_eq!(options.package_root, PathBuf::from("/deps"));
        assert!(!options.parallel_discovery);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            AnalyzerOptions::load(&missing),
            Err(ConfigError::ReadError { .. })
        ));
        assert!(matches!(
            AnalyzerOptions::from_json("{ nope"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
