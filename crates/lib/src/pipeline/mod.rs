//! Build pipeline controller.
//!
//! Drives a selected runner through a fixed stage sequence:
//!
//! 1. Prepare: parse the target with the runner's grammar, check there is a
//!    task to run and parse task argument placeholders
//! 2. Unshallow: fetch full git history when the checkout is shallow
//! 3. Configure: produce the [`Project`](crate::context::Project)
//! 4. Task: the runner's task, or the configured task script
//! 5. Collect and Filter: gather artifacts, narrowed by `archive_filter`
//! 6. Publish, or skip with a logged reason
//!
//! Each stage runs once. How a failure is handled is looked up in
//! [`Stage::on_failure`]: a failed task does not stop collection or
//! publishing, but the report marks the run as failed.

pub mod types;

use tracing::{error, info, warn};

use crate::context::Context;
use crate::fs::{existing_files, filter_artifacts};
use crate::git;
use crate::placeholder;
use crate::publish::{Publisher, PublisherDecision};
use crate::runners::{self, Runner, RunnerError};

pub use types::{FailurePolicy, PipelineError, PipelineOptions, PipelineReport, PublishOutcome, Stage, StageError};

/// Run every stage for one invocation.
///
/// Returns `Err` only for fatal stage failures. A failed task is reported
/// through [`PipelineReport::succeeded`].
pub async fn run(
  runner: &mut Runner,
  ctx: &Context,
  decision: &PublisherDecision,
  opts: &PipelineOptions,
) -> Result<PipelineReport, PipelineError> {
  enter(Stage::Prepare, runner);
  runner.prepare(ctx).map_err(|e| fatal(Stage::Prepare, e))?;
  if opts.target.task_script.is_none() && !runner.kind().has_default_task() {
    return Err(fatal(Stage::Prepare, RunnerError::NoDefaultTask));
  }
  let task_templates = placeholder::parse_all(&opts.task_args).map_err(|e| fatal(Stage::Prepare, e))?;

  if opts.skip_unshallow {
    info!("skipping git unshallow");
  } else {
    enter(Stage::Unshallow, runner);
    git::unshallow(&ctx.src_dir).await.map_err(|e| fatal(Stage::Unshallow, e))?;
  }

  enter(Stage::Configure, runner);
  let project = runner
    .configure(ctx, &opts.configure_args)
    .await
    .map_err(|e| fatal(Stage::Configure, e))?;
  info!(name = %project.name, version = %project.version, "project configured");

  let task_args = placeholder::render_all(&task_templates, ctx, &project);

  enter(Stage::Task, runner);
  let task_result = match &opts.target.task_script {
    Some(script) => {
      info!(script = %script.display(), "running task script");
      runners::run_task_script(ctx, &project, script, &task_args).await
    }
    None => runner.task(ctx, &project, &task_args).await,
  };
  let task_error = match task_result {
    Ok(()) => None,
    Err(e) => Some(tolerate(Stage::Task, e)?),
  };

  enter(Stage::Collect, runner);
  let (artifacts, collect_error) = match runner.collect(ctx, &project, &task_args).await {
    Ok(artifacts) => (existing_files(&ctx.build_dir, artifacts), None),
    Err(e) => (Vec::new(), Some(tolerate(Stage::Collect, e)?)),
  };

  let (artifacts, filter_error) = match &opts.target.archive_filter {
    Some(pattern) => match filter_artifacts(&artifacts, pattern) {
      Ok(kept) => {
        info!(stage = %Stage::Filter, %pattern, before = artifacts.len(), after = kept.len(), "filtered artifacts");
        (kept, None)
      }
      Err(e) => (Vec::new(), Some(tolerate(Stage::Filter, e)?)),
    },
    None => (artifacts, None),
  };
  for artifact in &artifacts {
    info!(%artifact, "artifact");
  }

  let publish = match plan_publish(decision, &artifacts, task_error.is_some(), opts.target.publish_on_failure) {
    PublishPlan::Skip(reason) => {
      info!(stage = %Stage::Publish, %reason, "skipping publish");
      PublishOutcome::Skipped(reason)
    }
    PublishPlan::Publish(publisher) => {
      info!(stage = %Stage::Publish, publisher = publisher.name(), count = artifacts.len(), "entering stage");
      publisher
        .publish(ctx, &project, &artifacts, opts.target.archive_extract_filter.as_deref())
        .await
        .map_err(|e| fatal(Stage::Publish, e))?;
      PublishOutcome::Published {
        publisher: publisher.name(),
        artifacts: artifacts.len(),
      }
    }
  };

  let report = PipelineReport {
    project,
    artifacts,
    task_error,
    collect_error,
    filter_error,
    publish,
  };
  if report.succeeded() {
    info!(project = %report.project, "pipeline finished");
  } else {
    error!(project = %report.project, "pipeline finished, task failed");
  }
  Ok(report)
}

/// Publish decision for the collected artifacts.
#[derive(Debug)]
pub enum PublishPlan<'a> {
  Publish(&'a Publisher),
  Skip(String),
}

pub fn plan_publish<'a>(
  decision: &'a PublisherDecision,
  artifacts: &[String],
  task_failed: bool,
  publish_on_failure: bool,
) -> PublishPlan<'a> {
  if task_failed && !publish_on_failure {
    return PublishPlan::Skip("task failed".to_string());
  }
  match decision.publisher() {
    None => PublishPlan::Skip(decision.reason().unwrap_or("no publisher available").to_string()),
    Some(_) if artifacts.is_empty() => PublishPlan::Skip("no artifacts to upload".to_string()),
    Some(publisher) => PublishPlan::Publish(publisher),
  }
}

fn enter(stage: Stage, runner: &Runner) {
  info!(%stage, runner = runner.name(), "entering stage");
}

/// Failure of a stage the policy table marks fatal.
fn fatal(stage: Stage, err: impl Into<StageError>) -> PipelineError {
  debug_assert_eq!(stage.on_failure(), FailurePolicy::Fatal, "{stage} is not a fatal stage");
  let source = err.into();
  error!(%stage, error = %source, "stage failed");
  PipelineError { stage, source }
}

/// Apply the stage's failure policy. Returns the error message when the
/// pipeline may continue.
fn tolerate(stage: Stage, err: impl Into<StageError>) -> Result<String, PipelineError> {
  let source = err.into();
  match stage.on_failure() {
    FailurePolicy::Fatal => {
      error!(%stage, error = %source, "stage failed");
      Err(PipelineError { stage, source })
    }
    FailurePolicy::Record => {
      error!(%stage, error = %source, "stage failed, continuing");
      Ok(source.to_string())
    }
    FailurePolicy::Warn => {
      warn!(%stage, error = %source, "stage failed, continuing with no artifacts");
      Ok(source.to_string())
    }
  }
}
