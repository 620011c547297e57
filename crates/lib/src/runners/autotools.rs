//! GNU autotools projects (`configure.ac`).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::RunnerError;
use crate::context::{Context, Project};
use crate::exec::{self, Cmd, make_jobs_flag};
use crate::fs::regular_files;

pub const NAME: &str = "autotools";

const UNKNOWN: &str = "UNKNOWN";

/// Distribution archive extensions, in collection order.
pub const DIST_EXTENSIONS: &[&str] = &["gz", "bz2", "xz", "zip", "lzip", "rpm", "deb"];

static CONFIG_LOG_VAR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"PACKAGE_(TARNAME|VERSION) *= *['"](.*)['"]"#).expect("valid regex"));

pub fn detect(ctx: &Context) -> bool {
  ctx.src_dir.join("configure.ac").is_file()
}

#[derive(Debug, Default)]
pub struct AutotoolsRunner;

impl AutotoolsRunner {
  pub async fn configure(&self, ctx: &Context, args: &[String]) -> Result<Project, RunnerError> {
    exec::run(
      &Cmd::new("autoreconf")
        .args(["--warnings=all", "--install", "--force"])
        .current_dir(&ctx.src_dir),
    )
    .await?;

    let configure = ctx.src_dir.join("configure");
    check_executable(&configure)?;

    exec::run(
      &Cmd::new(configure.to_string_lossy())
        .args(args.iter().cloned())
        .current_dir(&ctx.build_dir),
    )
    .await?;

    let log = std::fs::read_to_string(ctx.build_dir.join("config.log")).unwrap_or_else(|e| {
      debug!(error = %e, "config.log not readable");
      String::new()
    });
    let proj = project_from_config_log(&log);
    info!(name = %proj.name, version = %proj.version, "autotools project");
    Ok(proj)
  }

  pub async fn task(&self, ctx: &Context, _proj: &Project, args: &[String]) -> Result<(), RunnerError> {
    exec::run(&make_cmd(ctx, args)).await?;
    Ok(())
  }

  pub async fn collect(&self, ctx: &Context, proj: &Project, _args: &[String]) -> Result<Vec<String>, RunnerError> {
    Ok(dist_files(regular_files(&ctx.build_dir)?, &proj.name))
  }
}

/// `make -j<N> <args> <target>` in the build directory.
pub fn make_cmd(ctx: &Context, args: &[String]) -> Cmd {
  Cmd::new("make")
    .arg(make_jobs_flag())
    .args(args.iter().cloned())
    .arg(&ctx.target)
    .current_dir(&ctx.build_dir)
}

/// Extract `PACKAGE_TARNAME` and `PACKAGE_VERSION` from `config.log`
/// content. Missing values are `UNKNOWN`; later assignments win.
pub fn project_from_config_log(log: &str) -> Project {
  let mut name = UNKNOWN.to_string();
  let mut version = UNKNOWN.to_string();
  for caps in CONFIG_LOG_VAR.captures_iter(log) {
    match &caps[1] {
      "TARNAME" => name = caps[2].to_string(),
      _ => version = caps[2].to_string(),
    }
  }
  Project::new(name, version)
}

/// Files named `<name>-*` with a known archive extension, grouped by
/// extension in [`DIST_EXTENSIONS`] order.
pub fn dist_files(files: Vec<String>, name: &str) -> Vec<String> {
  let prefix = format!("{}-", name);
  let candidates: Vec<String> = files.into_iter().filter(|f| f.starts_with(&prefix)).collect();

  DIST_EXTENSIONS
    .iter()
    .flat_map(|ext| {
      let suffix = format!(".{}", ext);
      candidates
        .iter()
        .filter(move |c| c.ends_with(&suffix))
        .cloned()
        .collect::<Vec<_>>()
    })
    .collect()
}

fn check_executable(path: &Path) -> Result<(), RunnerError> {
  let meta = match std::fs::metadata(path) {
    Ok(meta) => meta,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RunnerError::ConfigureMissing),
    Err(e) => return Err(e.into()),
  };

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 == 0 {
      return Err(RunnerError::ConfigureNotExecutable);
    }
  }
  #[cfg(not(unix))]
  let _ = meta;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn detects_configure_ac() {
    let temp = tempdir().unwrap();
    let ctx = Context::new("dist", temp.path(), temp.path().join("build"));
    assert!(!detect(&ctx));
    fs::write(temp.path().join("configure.ac"), "AC_INIT([foo], [1.0])").unwrap();
    assert!(detect(&ctx));
  }

  #[test]
  fn parses_config_log() {
    let log = "\
## confdefs.h ##
PACKAGE_NAME='Foo Tool'
PACKAGE_TARNAME='footool'
PACKAGE_VERSION=\"0.3.1\"
PACKAGE_STRING='Foo Tool 0.3.1'
";
    assert_eq!(project_from_config_log(log), Project::new("footool", "0.3.1"));
  }

  #[test]
  fn missing_values_are_unknown() {
    assert_eq!(project_from_config_log(""), Project::new("UNKNOWN", "UNKNOWN"));
    assert_eq!(
      project_from_config_log("PACKAGE_VERSION='2'"),
      Project::new("UNKNOWN", "2")
    );
  }

  #[test]
  fn dist_files_group_by_extension_order() {
    let files = vec![
      "foo-1.0.tar.xz".to_string(),
      "foo-1.0.zip".to_string(),
      "foo-1.0.tar.gz".to_string(),
      "foo-1.0.tar.bz2".to_string(),
      "bar-1.0.tar.gz".to_string(),
      "foo-1.0.txt".to_string(),
      "config.log".to_string(),
    ];
    assert_eq!(
      dist_files(files, "foo"),
      vec!["foo-1.0.tar.gz", "foo-1.0.tar.bz2", "foo-1.0.tar.xz", "foo-1.0.zip"]
    );
  }

  #[test]
  fn make_cmd_appends_target() {
    let ctx = Context::new("distcheck", "/src", "/src/build");
    let cmd = make_cmd(&ctx, &["V=1".to_string()]);
    assert_eq!(cmd.program(), "make");
    let args = cmd.get_args();
    assert!(args[0].starts_with("-j"));
    assert_eq!(&args[1..], ["V=1", "distcheck"]);
  }

  #[test]
  fn missing_configure_script() {
    let temp = tempdir().unwrap();
    assert!(matches!(
      check_executable(&temp.path().join("configure")),
      Err(RunnerError::ConfigureMissing)
    ));
  }

  #[cfg(unix)]
  #[test]
  fn configure_must_be_executable() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().unwrap();
    let path = temp.path().join("configure");
    fs::write(&path, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    assert!(matches!(check_executable(&path), Err(RunnerError::ConfigureNotExecutable)));

    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    check_executable(&path).unwrap();
  }
}
