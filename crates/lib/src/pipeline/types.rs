//! Types for the build pipeline: stages, failure policy, options and the
//! run report.

use std::fmt;

use thiserror::Error;

use crate::config::{Config, TargetConfig};
use crate::context::Project;
use crate::exec::ExecError;
use crate::placeholder::PlaceholderError;
use crate::publish::PublishError;
use crate::runners::RunnerError;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Prepare,
  Unshallow,
  Configure,
  Task,
  Collect,
  Filter,
  Publish,
}

/// What the controller does when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
  /// Stop the pipeline and return the error.
  Fatal,
  /// Remember the failure, keep going, and fail the run at the end.
  Record,
  /// Log a warning and continue with an empty result.
  Warn,
}

impl Stage {
  pub fn on_failure(&self) -> FailurePolicy {
    match self {
      Stage::Prepare | Stage::Unshallow | Stage::Configure | Stage::Publish => FailurePolicy::Fatal,
      Stage::Task => FailurePolicy::Record,
      Stage::Collect | Stage::Filter => FailurePolicy::Warn,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Prepare => "prepare",
      Stage::Unshallow => "unshallow",
      Stage::Configure => "configure",
      Stage::Task => "task",
      Stage::Collect => "collect",
      Stage::Filter => "filter",
      Stage::Publish => "publish",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Runner(#[from] RunnerError),

  #[error(transparent)]
  Exec(#[from] ExecError),

  #[error("invalid task argument: {0}")]
  Placeholder(#[from] PlaceholderError),

  #[error("invalid archive_filter: {0}")]
  Filter(#[from] glob::PatternError),

  #[error(transparent)]
  Publish(#[from] PublishError),
}

/// A fatal stage failure.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
  pub stage: Stage,
  #[source]
  pub source: StageError,
}

/// Inputs that shape one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
  /// Effective configure arguments (defaults followed by target's own).
  pub configure_args: Vec<String>,
  /// Effective task arguments, before placeholder expansion.
  pub task_args: Vec<String>,
  pub target: TargetConfig,
  /// Skip the git unshallow step.
  pub skip_unshallow: bool,
}

impl PipelineOptions {
  /// Options for `target` as described by `config`.
  pub fn from_config(config: &Config, target: &str) -> Self {
    Self {
      configure_args: config.configure_args(target),
      task_args: config.task_args(target),
      target: config.target(target),
      skip_unshallow: false,
    }
  }
}

/// What happened at the publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
  Published { publisher: &'static str, artifacts: usize },
  Skipped(String),
}

/// Result of a pipeline run that reached the end.
#[derive(Debug, Clone)]
pub struct PipelineReport {
  pub project: Project,
  /// Artifacts after collection and filtering.
  pub artifacts: Vec<String>,
  pub task_error: Option<String>,
  pub collect_error: Option<String>,
  pub filter_error: Option<String>,
  pub publish: PublishOutcome,
}

impl PipelineReport {
  /// False when the task failed, even if publishing went ahead.
  pub fn succeeded(&self) -> bool {
    self.task_error.is_none()
  }
}
