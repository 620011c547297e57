//! Project version resolution.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::git;

/// How a runner derives the project version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionPolicy {
  /// Normalized `git describe` output.
  #[default]
  Git,
  /// UTC timestamp formatted as `YYYYMMDDHHMM`.
  Date,
  /// Seconds since the Unix epoch.
  Unix,
}

impl VersionPolicy {
  /// Configure-argument spelling of this policy.
  pub fn as_arg(&self) -> &'static str {
    match self {
      VersionPolicy::Git => "version-git",
      VersionPolicy::Date => "version-date",
      VersionPolicy::Unix => "version-unix",
    }
  }

  fn from_arg(arg: &str) -> Option<Self> {
    match arg {
      "version-git" => Some(VersionPolicy::Git),
      "version-date" => Some(VersionPolicy::Date),
      "version-unix" => Some(VersionPolicy::Unix),
      _ => None,
    }
  }

  /// Pick the policy from configure arguments. The last recognized
  /// `version-*` argument wins; anything else is ignored.
  pub fn from_args(args: &[String]) -> Self {
    args
      .iter()
      .filter_map(|a| Self::from_arg(a))
      .last()
      .unwrap_or_default()
  }
}

/// Format a timestamp version for the given policy. Returns `None` for
/// [`VersionPolicy::Git`], which needs a repository.
pub fn timestamp_version(policy: VersionPolicy, now: DateTime<Utc>) -> Option<String> {
  match policy {
    VersionPolicy::Git => None,
    VersionPolicy::Date => Some(now.format("%Y%m%d%H%M").to_string()),
    VersionPolicy::Unix => Some(now.timestamp().to_string()),
  }
}

/// Resolve the version of the project rooted at `repo`.
pub async fn resolve(policy: VersionPolicy, repo: &Path) -> String {
  match timestamp_version(policy, Utc::now()) {
    Some(version) => version,
    None => git::describe_version(repo).await,
  }
}
