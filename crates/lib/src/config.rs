//! Per-project configuration file.
//!
//! The file is YAML and lives at `.distrun.yml` in the source directory
//! unless overridden. A missing file is an empty configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Default configuration file name, relative to the source directory.
pub const CONFIG_FILE: &str = ".distrun.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },
}

/// Settings for one target name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
  pub configure_args: Vec<String>,
  pub task_args: Vec<String>,
  /// Script run instead of the runner's built-in task.
  pub task_script: Option<PathBuf>,
  /// Glob selecting which collected artifacts get published.
  pub archive_filter: Option<String>,
  /// Glob selecting which published artifacts the server should extract.
  pub archive_extract_filter: Option<String>,
  pub publish_on_failure: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub default_configure_args: Vec<String>,
  pub default_task_args: Vec<String>,
  pub targets: BTreeMap<String, TargetConfig>,
}

impl Config {
  /// Load the configuration at `path`, treating a missing file as empty.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    info!(path = %path.display(), targets = config.targets.len(), "loaded config");
    Ok(config)
  }

  pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
    // serde_yaml rejects an empty document
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(content)
  }

  /// Settings for `target`; unknown targets get an empty section.
  pub fn target(&self, target: &str) -> TargetConfig {
    self.targets.get(target).cloned().unwrap_or_default()
  }

  /// Default configure args followed by the target's own.
  pub fn configure_args(&self, target: &str) -> Vec<String> {
    let mut args = self.default_configure_args.clone();
    if let Some(t) = self.targets.get(target) {
      args.extend(t.configure_args.iter().cloned());
    }
    args
  }

  /// Default task args followed by the target's own.
  pub fn task_args(&self, target: &str) -> Vec<String> {
    let mut args = self.default_task_args.clone();
    if let Some(t) = self.targets.get(target) {
      args.extend(t.task_args.iter().cloned());
    }
    args
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  const SAMPLE: &str = r#"
default_configure_args: [--enable-foo]
default_task_args: [-ldflags=-s]
targets:
  dist-linux-amd64:
    configure_args: [--with-bar]
    task_args: [-tags=netgo]
    archive_filter: "*.tar.gz"
  distcheck:
    task_script: ci/check.sh
    publish_on_failure: true
"#;

  #[test]
  fn parses_sample() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.targets.len(), 2);
    let t = config.target("dist-linux-amd64");
    assert_eq!(t.archive_filter.as_deref(), Some("*.tar.gz"));
    assert!(!t.publish_on_failure);

    let check = config.target("distcheck");
    assert_eq!(check.task_script, Some(PathBuf::from("ci/check.sh")));
    assert!(check.publish_on_failure);
  }

  #[test]
  fn effective_args_append_target_args() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.configure_args("dist-linux-amd64"), vec!["--enable-foo", "--with-bar"]);
    assert_eq!(config.task_args("dist-linux-amd64"), vec!["-ldflags=-s", "-tags=netgo"]);
  }

  #[test]
  fn unknown_target_gets_defaults_only() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.target("dist-plan9-386"), TargetConfig::default());
    assert_eq!(config.configure_args("dist-plan9-386"), vec!["--enable-foo"]);
  }

  #[test]
  fn empty_document_is_default() {
    assert_eq!(Config::parse("").unwrap(), Config::default());
    assert_eq!(Config::parse("  \n").unwrap(), Config::default());
  }

  #[test]
  fn unknown_field_is_rejected() {
    assert!(Config::parse("default_args: [x]").is_err());
  }

  #[test]
  fn missing_file_is_default() {
    let temp = tempdir().unwrap();
    let config = Config::load(&temp.path().join(CONFIG_FILE)).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn invalid_file_reports_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join(CONFIG_FILE);
    std::fs::write(&path, "targets: [1, 2").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(".distrun.yml"));
  }
}
