//! Filesystem helpers used by runners while collecting artifacts.

use std::fs;
use std::io;
use std::path::Path;

use glob::{MatchOptions, Pattern, PatternError};
use tracing::warn;

/// License file names, in lookup order.
pub const LICENSE_FILES: &[&str] = &["LICENSE", "LICENCE", "UNLICENSE", "COPYING", "COPYRIGHT"];

/// Readme file names, in lookup order.
pub const README_FILES: &[&str] = &["README", "README.md"];

/// First license file present in `dir`.
pub fn find_license(dir: &Path) -> Option<&'static str> {
  find_first(dir, LICENSE_FILES)
}

/// First readme file present in `dir`.
pub fn find_readme(dir: &Path) -> Option<&'static str> {
  find_first(dir, README_FILES)
}

fn find_first(dir: &Path, candidates: &[&'static str]) -> Option<&'static str> {
  candidates.iter().copied().find(|name| dir.join(name).exists())
}

/// Copy `src` over `dst`, truncating any existing file.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  fs::copy(src, dst).map(|_| ())
}

/// Names of the regular files directly inside `dir`, sorted by name.
pub fn regular_files(dir: &Path) -> io::Result<Vec<String>> {
  let mut names = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if entry.file_type()?.is_file() {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
  }
  names.sort();
  Ok(names)
}

/// Keep the names that exist as regular files in `dir`, in order.
pub fn existing_files(dir: &Path, names: Vec<String>) -> Vec<String> {
  names
    .into_iter()
    .filter(|name| {
      let found = dir.join(name).is_file();
      if !found {
        warn!(artifact = %name, "collected artifact not found, dropping");
      }
      found
    })
    .collect()
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: false,
};

/// Shell-style match of a whole file name against `pattern`.
///
/// A malformed pattern matches nothing.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
  Pattern::new(pattern)
    .map(|p| p.matches_with(name, MATCH_OPTIONS))
    .unwrap_or(false)
}

/// Keep the artifacts matching `pattern`, preserving order and duplicates.
pub fn filter_artifacts(artifacts: &[String], pattern: &str) -> Result<Vec<String>, PatternError> {
  let pattern = Pattern::new(pattern)?;
  Ok(
    artifacts
      .iter()
      .filter(|name| pattern.matches_with(name, MATCH_OPTIONS))
      .cloned()
      .collect(),
  )
}
