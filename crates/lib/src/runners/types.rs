//! Error type shared by every runner.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::exec::ExecError;
use crate::target::TargetError;

/// Errors from runner dispatch and the runner lifecycle steps.
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The target name does not fit the runner's grammar.
  #[error(transparent)]
  Target(#[from] TargetError),

  /// An external tool failed.
  #[error(transparent)]
  Exec(#[from] ExecError),

  #[error("archive error: {0}")]
  Archive(#[from] ArchiveError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to reset build directory {path}: {source}")]
  BuildDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("no runner found for {0}")]
  NoRunner(PathBuf),

  #[error("`configure` script was not created")]
  ConfigureMissing,

  #[error("`configure` script is not executable")]
  ConfigureNotExecutable,

  #[error("script runner does not have a default task, please set task_script in your config")]
  NoDefaultTask,

  /// A lifecycle step ran before `prepare` parsed the target.
  #[error("{0} runner used before its target was prepared")]
  NotPrepared(&'static str),

  /// HTTP request failed while bootstrapping a toolchain.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  #[error("no AVR toolchain available for {os}-{arch}")]
  ToolchainNotFound { os: String, arch: String },
}
