//! Build-system runners and their registry.
//!
//! A runner encapsulates the configure/task/collect lifecycle of one build
//! system. Dispatch walks [`REGISTRY`] in order and picks the first runner
//! whose detection predicate matches the source tree. The script runner
//! matches everything, so it always comes last.

pub mod autotools;
pub mod dwtk;
pub mod golang;
pub mod script;
pub mod types;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::context::{Context, Project};
use crate::exec::{self, Cmd, make_jobs_flag};

pub use autotools::AutotoolsRunner;
pub use dwtk::DwtkRunner;
pub use golang::GolangRunner;
pub use script::ScriptRunner;
pub use types::RunnerError;

/// Identifies a runner implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
  Autotools,
  Golang,
  Dwtk,
  Script,
}

/// Runners in detection order. The first match wins.
pub const REGISTRY: [RunnerKind; 4] = [
  RunnerKind::Autotools,
  RunnerKind::Golang,
  RunnerKind::Dwtk,
  RunnerKind::Script,
];

impl RunnerKind {
  pub fn name(&self) -> &'static str {
    match self {
      RunnerKind::Autotools => autotools::NAME,
      RunnerKind::Golang => golang::NAME,
      RunnerKind::Dwtk => dwtk::NAME,
      RunnerKind::Script => script::NAME,
    }
  }

  /// Whether this runner handles the source tree. Never runs a process.
  pub fn detect(&self, ctx: &Context) -> bool {
    match self {
      RunnerKind::Autotools => autotools::detect(ctx),
      RunnerKind::Golang => golang::detect(ctx),
      RunnerKind::Dwtk => dwtk::detect(ctx),
      RunnerKind::Script => script::detect(ctx),
    }
  }

  /// Whether the runner can build without a configured task script.
  pub fn has_default_task(&self) -> bool {
    !matches!(self, RunnerKind::Script)
  }

  /// A fresh runner with empty state.
  pub fn instantiate(self) -> Runner {
    match self {
      RunnerKind::Autotools => Runner::Autotools(AutotoolsRunner),
      RunnerKind::Golang => Runner::Golang(GolangRunner::default()),
      RunnerKind::Dwtk => Runner::Dwtk(DwtkRunner::default()),
      RunnerKind::Script => Runner::Script(ScriptRunner::default()),
    }
  }
}

/// A selected runner together with the state its lifecycle accumulates.
#[derive(Debug)]
pub enum Runner {
  Autotools(AutotoolsRunner),
  Golang(GolangRunner),
  Dwtk(DwtkRunner),
  Script(ScriptRunner),
}

impl Runner {
  pub fn kind(&self) -> RunnerKind {
    match self {
      Runner::Autotools(_) => RunnerKind::Autotools,
      Runner::Golang(_) => RunnerKind::Golang,
      Runner::Dwtk(_) => RunnerKind::Dwtk,
      Runner::Script(_) => RunnerKind::Script,
    }
  }

  pub fn name(&self) -> &'static str {
    self.kind().name()
  }

  /// Parse the target name with this runner's grammar.
  ///
  /// Runs before any external process so a bad target fails fast.
  pub fn prepare(&mut self, ctx: &Context) -> Result<(), RunnerError> {
    match self {
      Runner::Golang(r) => r.prepare(ctx),
      Runner::Dwtk(r) => r.prepare(ctx),
      Runner::Autotools(_) | Runner::Script(_) => Ok(()),
    }
  }

  pub async fn configure(&mut self, ctx: &Context, args: &[String]) -> Result<Project, RunnerError> {
    match self {
      Runner::Autotools(r) => r.configure(ctx, args).await,
      Runner::Golang(r) => r.configure(ctx, args).await,
      Runner::Dwtk(r) => r.configure(ctx, args).await,
      Runner::Script(r) => r.configure(ctx, args).await,
    }
  }

  pub async fn task(&mut self, ctx: &Context, proj: &Project, args: &[String]) -> Result<(), RunnerError> {
    match self {
      Runner::Autotools(r) => r.task(ctx, proj, args).await,
      Runner::Golang(r) => r.task(ctx, proj, args).await,
      Runner::Dwtk(r) => r.task(ctx, proj, args).await,
      Runner::Script(r) => r.task(ctx, proj, args).await,
    }
  }

  /// Artifact file names, relative to the build directory.
  pub async fn collect(&mut self, ctx: &Context, proj: &Project, args: &[String]) -> Result<Vec<String>, RunnerError> {
    match self {
      Runner::Autotools(r) => r.collect(ctx, proj, args).await,
      Runner::Golang(r) => r.collect(ctx, proj, args).await,
      Runner::Dwtk(r) => r.collect(ctx, proj, args).await,
      Runner::Script(r) => r.collect(ctx, proj, args).await,
    }
  }
}

/// First registry entry whose detection matches.
pub fn detect(ctx: &Context) -> Option<RunnerKind> {
  REGISTRY.into_iter().find(|kind| {
    let matched = kind.detect(ctx);
    debug!(runner = kind.name(), matched, "runner detection");
    matched
  })
}

/// Delete `dir` recursively and recreate it empty.
pub fn reset_build_dir(dir: &Path) -> Result<(), RunnerError> {
  let to_err = |source| RunnerError::BuildDir {
    path: dir.to_path_buf(),
    source,
  };
  match std::fs::remove_dir_all(dir) {
    Ok(()) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(to_err(e)),
  }
  std::fs::create_dir_all(dir).map_err(to_err)
}

/// Reset the build directory and pick the runner for the source tree.
pub fn select_runner(
  target: &str,
  src_dir: impl Into<PathBuf>,
  build_dir: impl Into<PathBuf>,
) -> Result<(Runner, Context), RunnerError> {
  let ctx = Context::new(target, src_dir, build_dir);
  reset_build_dir(&ctx.build_dir)?;

  let kind = detect(&ctx).ok_or_else(|| RunnerError::NoRunner(ctx.src_dir.clone()))?;
  info!(runner = kind.name(), src = %ctx.src_dir.display(), "selected runner");
  Ok((kind.instantiate(), ctx))
}

/// Build the command for a user-provided task script.
///
/// Relative script paths resolve against the source directory. The script
/// runs in the build directory with the project exported in its environment.
pub fn task_script_cmd(ctx: &Context, proj: &Project, script: &Path, args: &[String]) -> Cmd {
  let script = if script.is_absolute() {
    script.to_path_buf()
  } else {
    ctx.src_dir.join(script)
  };

  Cmd::new(script.to_string_lossy())
    .args(args.iter().cloned())
    .current_dir(&ctx.build_dir)
    .env("SRCDIR", ctx.src_dir.to_string_lossy())
    .env("BUILDDIR", ctx.build_dir.to_string_lossy())
    .env("PN", &proj.name)
    .env("PV", &proj.version)
    .env("P", proj.full_name())
    .env("MAKE_CMD", format!("make {}", make_jobs_flag()))
}

/// Run a task script in place of the runner's built-in task.
pub async fn run_task_script(ctx: &Context, proj: &Project, script: &Path, args: &[String]) -> Result<(), RunnerError> {
  exec::run(&task_script_cmd(ctx, proj, script, args)).await?;
  Ok(())
}
