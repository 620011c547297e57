//! Git repository helpers.

use std::path::Path;

use tracing::{debug, info};

use crate::exec::{self, Cmd, ExecError};

/// Version reported when `git describe` cannot produce one.
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

/// Project version from `git describe --abbrev=4 HEAD`.
///
/// Falls back to [`UNKNOWN_VERSION`] when the directory is not a repository
/// or has no tags.
pub async fn describe_version(repo: &Path) -> String {
  let cmd = Cmd::new("git").args(["describe", "--abbrev=4", "HEAD"]).current_dir(repo);
  match exec::output(&cmd).await {
    Ok(raw) => normalize_describe(&raw),
    Err(e) => {
      debug!(error = %e, "git describe failed");
      UNKNOWN_VERSION.to_string()
    }
  }
}

/// Turn `git describe` output into a version string.
///
/// `v1.2-3-gabcd` becomes `1.2.3-abcd`: the leading `v` is dropped, the
/// commit count is joined with a dot and the `g` hash marker is removed.
pub fn normalize_describe(raw: &str) -> String {
  let version = raw.trim();
  let version = version.strip_prefix('v').unwrap_or(version);
  let version = version.replacen('-', ".", 1);
  let version = version.replacen("-g", "-", 1);
  version.trim().to_string()
}

/// Fetch full history and tags for a shallow clone.
///
/// CI providers usually check out shallow clones, which break `git describe`.
/// Repositories without `.git/shallow` are left alone.
pub async fn unshallow(repo: &Path) -> Result<(), ExecError> {
  if !repo.join(".git").join("shallow").exists() {
    debug!(repo = %repo.display(), "repository is not shallow");
    return Ok(());
  }

  info!(repo = %repo.display(), "unshallowing repository");
  exec::run(&Cmd::new("git").args(["fetch", "--unshallow"]).current_dir(repo)).await?;
  exec::run(&Cmd::new("git").args(["fetch", "--tags", "--force"]).current_dir(repo)).await
}
