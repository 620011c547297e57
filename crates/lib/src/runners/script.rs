//! Fallback runner for projects driven entirely by a task script.

use tracing::info;

use super::RunnerError;
use crate::context::{Context, Project};
use crate::fs::regular_files;
use crate::version::{self, VersionPolicy};

pub const NAME: &str = "script";

/// Matches any source tree.
pub fn detect(_ctx: &Context) -> bool {
  true
}

#[derive(Debug, Default)]
pub struct ScriptRunner {
  policy: VersionPolicy,
}

impl ScriptRunner {
  /// Configure args select the version policy: `version-git` (default),
  /// `version-date` or `version-unix`.
  pub async fn configure(&mut self, ctx: &Context, args: &[String]) -> Result<Project, RunnerError> {
    self.policy = VersionPolicy::from_args(args);
    let proj = Project::new(ctx.src_basename(), version::resolve(self.policy, &ctx.src_dir).await);
    info!(project = %proj, policy = self.policy.as_arg(), "script project");
    Ok(proj)
  }

  pub async fn task(&mut self, _ctx: &Context, _proj: &Project, _args: &[String]) -> Result<(), RunnerError> {
    Err(RunnerError::NoDefaultTask)
  }

  /// Every regular file the task script left in the build directory.
  pub async fn collect(&mut self, ctx: &Context, _proj: &Project, _args: &[String]) -> Result<Vec<String>, RunnerError> {
    Ok(regular_files(&ctx.build_dir)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[tokio::test]
  async fn configure_uses_version_policy() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("site");
    fs::create_dir(&src).unwrap();
    let ctx = Context::new("dist", &src, src.join("build"));

    let mut runner = ScriptRunner::default();
    let proj = runner.configure(&ctx, &["version-unix".to_string()]).await.unwrap();
    assert_eq!(proj.name, "site");
    assert!(proj.version.parse::<i64>().unwrap() > 1_600_000_000);

    let proj = runner.configure(&ctx, &["version-date".to_string()]).await.unwrap();
    assert_eq!(proj.version.len(), 12);

    let proj = runner.configure(&ctx, &[]).await.unwrap();
    assert_eq!(proj.version, "UNKNOWN");
  }

  #[tokio::test]
  async fn task_requires_script() {
    let ctx = Context::new("dist", "/src", "/src/build");
    let err = ScriptRunner::default()
      .task(&ctx, &Project::new("a", "1"), &[])
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "script runner does not have a default task, please set task_script in your config"
    );
  }

  #[tokio::test]
  async fn collect_lists_regular_files_sorted() {
    let temp = tempdir().unwrap();
    let build = temp.path().join("build");
    fs::create_dir_all(build.join("tmp")).unwrap();
    fs::write(build.join("site-2.tar.gz"), "").unwrap();
    fs::write(build.join("docs.zip"), "").unwrap();

    let ctx = Context::new("dist", temp.path(), &build);
    let artifacts = ScriptRunner::default()
      .collect(&ctx, &Project::new("site", "2"), &[])
      .await
      .unwrap();
    assert_eq!(artifacts, vec!["docs.zip", "site-2.tar.gz"]);
  }
}
