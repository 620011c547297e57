//! Go projects.
//!
//! `distcheck` runs the test suite. `dist-<os>-<arch>[-debug]` cross-compiles
//! every `package main` directory and bundles the binaries with a combined
//! license file (the project's own plus every vendored dependency's) and
//! the readme.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::RunnerError;
use crate::archive::write_archive;
use crate::context::{Context, Project, basename};
use crate::exec::{self, Cmd};
use crate::fs::{copy_file, find_license, find_readme};
use crate::git;
use crate::platform::Platform;
use crate::target::{Target, TargetAction};

pub const NAME: &str = "golang";

static MAIN_PACKAGE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^[ \t]*package[ \t]+main[ \t]*$").expect("valid regex"));

/// Whether any `.go` file exists in the source tree.
pub fn detect(ctx: &Context) -> bool {
  WalkDir::new(&ctx.src_dir)
    .into_iter()
    .filter_map(Result::ok)
    .any(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "go"))
}

#[derive(Debug, Default)]
pub struct GolangRunner {
  target: Option<Target>,
  /// Set when the toolchain understands `go mod`; exported to every `go`
  /// child as `GO111MODULE=on`.
  modules: bool,
  binaries: Vec<String>,
}

impl GolangRunner {
  pub fn prepare(&mut self, ctx: &Context) -> Result<(), RunnerError> {
    let target = Target::parse(&ctx.target, NAME)?;
    debug!(?target, "parsed golang target");
    self.target = Some(target);
    Ok(())
  }

  pub async fn configure(&mut self, ctx: &Context, _args: &[String]) -> Result<Project, RunnerError> {
    let proj = Project::new(ctx.src_basename(), git::describe_version(&ctx.src_dir).await);
    self.modules = exec::succeeds(&Cmd::new("go").args(["help", "mod"])).await;
    info!(project = %proj, modules = self.modules, "golang project");
    Ok(proj)
  }

  pub async fn task(&mut self, ctx: &Context, _proj: &Project, args: &[String]) -> Result<(), RunnerError> {
    let target = self.target()?;
    match (target.action, target.platform) {
      (TargetAction::Build, Some(platform)) => {
        for dir in main_packages(&ctx.src_dir)? {
          exec::run(&self.build_cmd(ctx, platform, args, &dir)).await?;
          self.binaries.push(format!("{}{}", basename(&dir), platform.exe_suffix()));
        }
        Ok(())
      }
      _ => {
        let cmd = self
          .go(["test", "-v"])
          .args(args.iter().cloned())
          .current_dir(&ctx.src_dir);
        exec::run(&cmd).await?;
        Ok(())
      }
    }
  }

  pub async fn collect(&mut self, ctx: &Context, proj: &Project, _args: &[String]) -> Result<Vec<String>, RunnerError> {
    let target = self.target()?;
    let Some(platform) = target.platform else {
      return Ok(Vec::new());
    };

    let mut entries = self.binaries.clone();
    if self.write_license(ctx).await? {
      entries.push("license.txt".to_string());
    }
    if let Some(readme) = find_readme(&ctx.src_dir) {
      copy_file(&ctx.src_dir.join(readme), &ctx.build_dir.join("readme.txt"))?;
      entries.push("readme.txt".to_string());
    }

    let prefix = archive_prefix(proj, &platform, target.debug);
    let name = write_archive(
      platform.archive_format(),
      &ctx.build_dir,
      &ctx.build_dir,
      &prefix,
      &entries,
    )?;
    Ok(vec![name])
  }

  fn target(&self) -> Result<Target, RunnerError> {
    self.target.ok_or(RunnerError::NotPrepared(NAME))
  }

  fn go<I, S>(&self, args: I) -> Cmd
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let cmd = Cmd::new("go").args(args);
    if self.modules { cmd.env("GO111MODULE", "on") } else { cmd }
  }

  /// `go build -v -x <args> <dir>` in the build directory, cross-compiling
  /// for `platform`.
  pub fn build_cmd(&self, ctx: &Context, platform: Platform, args: &[String], dir: &Path) -> Cmd {
    let mut cmd = self
      .go(["build", "-v", "-x"])
      .args(args.iter().cloned())
      .arg(dir.to_string_lossy())
      .current_dir(&ctx.build_dir);
    for (key, value) in platform.go_env() {
      cmd = cmd.env(key, value);
    }
    cmd
  }

  /// Write `license.txt` into the build directory. Returns false when the
  /// project has no license file.
  async fn write_license(&self, ctx: &Context) -> Result<bool, RunnerError> {
    let vendor = ctx.src_dir.join("vendor");
    if ctx.src_dir.join("go.mod").is_file() && !vendor.exists() {
      exec::run(&self.go(["mod", "vendor"]).current_dir(&ctx.src_dir)).await?;
    }

    let Some(content) = combined_license(&ctx.src_dir)? else {
      debug!("no license file found");
      return Ok(false);
    };
    tokio::fs::write(ctx.build_dir.join("license.txt"), content).await?;
    Ok(true)
  }
}

/// `<name>-<os>-<arch>[-debug]-<version>`
pub fn archive_prefix(proj: &Project, platform: &Platform, debug: bool) -> String {
  let debug = if debug { "-debug" } else { "" };
  format!("{}-{}{}-{}", proj.name, platform.name(), debug, proj.version)
}

/// Directories holding a `package main` source file, outside `vendor/`.
pub fn main_packages(src: &Path) -> Result<Vec<PathBuf>, RunnerError> {
  let mut dirs: Vec<PathBuf> = Vec::new();
  let walker = WalkDir::new(src)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == "vendor"));

  for entry in walker {
    let entry = entry.map_err(std::io::Error::from)?;
    if !entry.file_type().is_file() || entry.path().extension().is_none_or(|ext| ext != "go") {
      continue;
    }
    let content = std::fs::read_to_string(entry.path())?;
    if !MAIN_PACKAGE.is_match(&content) {
      continue;
    }
    let Some(dir) = entry.path().parent() else {
      continue;
    };
    if !dirs.iter().any(|d| d == dir) {
      dirs.push(dir.to_path_buf());
    }
  }

  debug!(count = dirs.len(), "found main packages");
  Ok(dirs)
}

/// The project's license followed by every vendored dependency's license,
/// each under a `#### License for <path>:` header.
pub fn combined_license(src: &Path) -> Result<Option<String>, RunnerError> {
  let Some(main) = find_license(src) else {
    return Ok(None);
  };
  let mut content = std::fs::read_to_string(src.join(main))?;

  let vendor = src.join("vendor");
  if vendor.is_dir() {
    for entry in WalkDir::new(&vendor).min_depth(1).sort_by_file_name() {
      let entry = entry.map_err(std::io::Error::from)?;
      if !entry.file_type().is_dir() {
        continue;
      }
      let Some(license) = find_license(entry.path()) else {
        continue;
      };
      let repo = entry.path().strip_prefix(&vendor).unwrap_or(entry.path());
      content.push_str(&format!("\n\n\n#### License for {}:\n\n", repo.display()));
      content.push_str(&std::fs::read_to_string(entry.path().join(license))?);
    }
  }

  Ok(Some(content))
}
