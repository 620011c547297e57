//! Implementation of the `distrun run` command.
//!
//! Loads the config, dispatches a runner for the source tree and drives it
//! through the pipeline. Publishing is gated on the CI environment.

use anyhow::{Context, Result};

use distrun_lib::config::Config;
use distrun_lib::pipeline::{self, PipelineOptions};
use distrun_lib::publish::{CiEnv, select_publisher};
use distrun_lib::runners::select_runner;

use super::Paths;
use crate::output::{format_outcome, print_error, print_stat, print_success};

/// Returns whether the task succeeded. Fatal stage failures are errors.
pub fn cmd_run(paths: &Paths, target: &str, skip_unshallow: bool) -> Result<bool> {
  let config = Config::load(&paths.config)?;
  let opts = PipelineOptions {
    skip_unshallow,
    ..PipelineOptions::from_config(&config, target)
  };
  let decision = select_publisher(&CiEnv::from_env());

  let (mut runner, ctx) = select_runner(target, &paths.source, &paths.build)?;

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;
  let report = rt.block_on(pipeline::run(&mut runner, &ctx, &decision, &opts))?;

  println!();
  if report.succeeded() {
    print_success(&format!("Built {} with {}", report.project, runner.name()));
  } else {
    print_error(&format!("Task failed for {} with {}", report.project, runner.name()));
  }
  print_stat("Target", target);
  print_stat("Artifacts", &report.artifacts.len().to_string());
  for artifact in &report.artifacts {
    println!("    {}", artifact);
  }
  print_stat("Publish", &format_outcome(&report.publish));
  if let Some(err) = &report.task_error {
    print_stat("Task error", err);
  }
  if let Some(err) = &report.collect_error {
    print_stat("Collect error", err);
  }
  if let Some(err) = &report.filter_error {
    print_stat("Filter error", err);
  }

  Ok(report.succeeded())
}
