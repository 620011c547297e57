//! External command execution.
//!
//! Every tool the pipeline drives (git, make, go, configure scripts, task
//! scripts) goes through this module, so each invocation is logged with its
//! working directory before it runs and its exit code after it finishes.
//! Output is inherited from the parent so build logs stream straight to the
//! CI console.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
  /// The program could not be started at all.
  #[error("failed to spawn `{cmd}`: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}")]
  Failed { cmd: String, code: Option<i32> },
}

impl ExecError {
  /// Exit code of the failed command, if it exited normally.
  pub fn code(&self) -> Option<i32> {
    match self {
      ExecError::Spawn { .. } => None,
      ExecError::Failed { code, .. } => *code,
    }
  }
}

/// A command line plus the directory and extra environment it runs with.
///
/// Extra variables are layered on top of the inherited process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
  program: String,
  args: Vec<String>,
  cwd: Option<PathBuf>,
  env: BTreeMap<String, String>,
}

impl Cmd {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn get_args(&self) -> &[String] {
    &self.args
  }

  pub fn get_env(&self, key: &str) -> Option<&str> {
    self.env.get(key).map(String::as_str)
  }

  fn to_command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.args).envs(&self.env);
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }
    command
  }
}

impl fmt::Display for Cmd {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// Run a command to completion with inherited stdout/stderr.
///
/// Logs the command line, its directory and extra environment before
/// spawning, and the exit code afterwards.
pub async fn run(cmd: &Cmd) -> Result<(), ExecError> {
  info!(cmd = %cmd, dir = ?cmd.cwd, "running command");
  for (key, value) in &cmd.env {
    debug!(%key, %value, "command environment");
  }

  let status = cmd
    .to_command()
    .stdin(Stdio::null())
    .status()
    .await
    .map_err(|source| ExecError::Spawn {
      cmd: cmd.to_string(),
      source,
    })?;

  let code = status.code();
  if status.success() {
    info!(exit_code = ?code, "command finished");
    Ok(())
  } else {
    warn!(exit_code = ?code, cmd = %cmd, "command failed");
    Err(ExecError::Failed {
      cmd: cmd.to_string(),
      code,
    })
  }
}

/// Run a command and capture its stdout (trimmed).
///
/// Used for queries such as `git describe` whose output feeds back into the
/// pipeline rather than into the build log. Stderr is discarded.
pub async fn output(cmd: &Cmd) -> Result<String, ExecError> {
  debug!(cmd = %cmd, dir = ?cmd.cwd, "capturing command output");

  let output = cmd
    .to_command()
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .output()
    .await
    .map_err(|source| ExecError::Spawn {
      cmd: cmd.to_string(),
      source,
    })?;

  if !output.status.success() {
    return Err(ExecError::Failed {
      cmd: cmd.to_string(),
      code: output.status.code(),
    });
  }

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether a command runs and exits successfully, with all output discarded.
pub async fn succeeds(cmd: &Cmd) -> bool {
  let status = cmd
    .to_command()
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .await;
  matches!(status, Ok(s) if s.success())
}

/// `-j<N>` with N = available CPUs + 1.
pub fn make_jobs_flag() -> String {
  let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  format!("-j{}", cpus + 1)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn sh(script: &str) -> Cmd {
    Cmd::new("/bin/sh").arg("-c").arg(script)
  }

  #[tokio::test]
  async fn run_success() {
    run(&sh("exit 0")).await.unwrap();
  }

  #[tokio::test]
  async fn run_failure_reports_exit_code() {
    let err = run(&sh("exit 3")).await.unwrap_err();
    assert!(matches!(err, ExecError::Failed { code: Some(3), .. }));
    assert_eq!(err.code(), Some(3));
  }

  #[tokio::test]
  async fn run_missing_program_is_spawn_error() {
    let err = run(&Cmd::new("/definitely/not/a/program")).await.unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }));
    assert_eq!(err.code(), None);
  }

  #[tokio::test]
  async fn output_captures_trimmed_stdout() {
    let out = output(&sh("echo '  hello  '")).await.unwrap();
    assert_eq!(out, "hello");
  }

  #[tokio::test]
  async fn extra_env_is_layered_on_process_env() {
    let out = output(&sh("echo \"$MY_VAR:${PATH:+has-path}\"").env("MY_VAR", "my_value"))
      .await
      .unwrap();
    assert_eq!(out, "my_value:has-path");
  }

  #[tokio::test]
  async fn runs_in_current_dir() {
    let temp = TempDir::new().unwrap();
    run(&sh("touch cwd_marker").current_dir(temp.path())).await.unwrap();
    assert!(temp.path().join("cwd_marker").exists());
  }

  #[tokio::test]
  async fn succeeds_reports_status() {
    assert!(succeeds(&sh("true")).await);
    assert!(!succeeds(&sh("false")).await);
    assert!(!succeeds(&Cmd::new("/definitely/not/a/program")).await);
  }

  #[test]
  fn display_joins_program_and_args() {
    let cmd = Cmd::new("make").args(["-j3", "dist"]);
    assert_eq!(cmd.to_string(), "make -j3 dist");
  }

  #[test]
  fn make_jobs_flag_is_at_least_two() {
    let flag = make_jobs_flag();
    let n: usize = flag.trim_start_matches("-j").parse().unwrap();
    assert!(n >= 2);
  }
}
