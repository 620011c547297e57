//! Per-invocation records shared by every pipeline stage.

use std::fmt;
use std::path::{Path, PathBuf};

/// Immutable description of one invocation: which target to build, where the
/// sources live and where build output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
  pub target: String,
  pub src_dir: PathBuf,
  pub build_dir: PathBuf,
}

impl Context {
  pub fn new(target: impl Into<String>, src_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
    Self {
      target: target.into(),
      src_dir: src_dir.into(),
      build_dir: build_dir.into(),
    }
  }

  /// Base name of the source directory, used as the default project name.
  pub fn src_basename(&self) -> String {
    basename(&self.src_dir)
  }
}

/// Name and version of the project being built, produced by a runner's
/// configure step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
  pub name: String,
  pub version: String,
}

impl Project {
  pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
    }
  }

  /// `<name>-<version>`, the conventional distribution prefix.
  pub fn full_name(&self) -> String {
    format!("{}-{}", self.name, self.version)
  }
}

impl fmt::Display for Project {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.name, self.version)
  }
}

pub(crate) fn basename(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "UNKNOWN".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn src_basename_uses_last_component() {
    let ctx = Context::new("distcheck", "/home/ci/work/mytool", "/home/ci/work/mytool/build");
    assert_eq!(ctx.src_basename(), "mytool");
  }

  #[test]
  fn project_full_name() {
    let proj = Project::new("mytool", "1.2.3");
    assert_eq!(proj.full_name(), "mytool-1.2.3");
    assert_eq!(proj.to_string(), "mytool 1.2.3");
  }
}
