//! AVR firmware projects built with dwtk (`dwtk-config.mk`).
//!
//! Targets name the microcontroller: `dist-atmega328p`, or `dist-avr` to
//! keep whatever MCU the project's own makefile selects. When `avr-gcc` is
//! missing the task step bootstraps a prebuilt toolchain into the build
//! directory first.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::RunnerError;
use crate::archive::{ArchiveFormat, write_archive};
use crate::context::{Context, Project};
use crate::exec::{self, Cmd, make_jobs_flag};
use crate::fs::{copy_file, find_license, find_readme, regular_files};
use crate::git;
use crate::platform::arch::Arch;
use crate::platform::os::Os;
use crate::target::FirmwareTarget;

pub const NAME: &str = "dwtk";

/// Mirror holding one directory per toolchain release, plus a `LATEST/`
/// listing of the newest one.
pub const TOOLCHAIN_BASE_URL: &str = "https://distfiles.rgm.io/avr-toolchain";

/// Make's output directory, relative to the build directory.
pub const ROOT_DIR: &str = "__root__";

static TARBALL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#""(avr-toolchain-([a-z0-9]+)-([a-z0-9]+)-([0-9]+)\.tar\.xz)""#).expect("valid regex")
});

pub fn detect(ctx: &Context) -> bool {
  ctx.src_dir.join("dwtk-config.mk").is_file()
}

#[derive(Debug)]
pub struct DwtkRunner {
  target: Option<FirmwareTarget>,
  base_url: String,
}

impl Default for DwtkRunner {
  fn default() -> Self {
    Self {
      target: None,
      base_url: TOOLCHAIN_BASE_URL.to_string(),
    }
  }
}

/// A toolchain tarball picked from the release index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  pub file: String,
  pub url: String,
}

impl DwtkRunner {
  pub fn prepare(&mut self, ctx: &Context) -> Result<(), RunnerError> {
    let target = FirmwareTarget::parse(&ctx.target, NAME)?;
    debug!(mcu = %target.mcu, debug = target.debug, "parsed firmware target");
    self.target = Some(target);
    Ok(())
  }

  pub async fn configure(&mut self, ctx: &Context, _args: &[String]) -> Result<Project, RunnerError> {
    let proj = Project::new(ctx.src_basename(), git::describe_version(&ctx.src_dir).await);
    info!(project = %proj, "dwtk project");
    Ok(proj)
  }

  pub async fn task(&mut self, ctx: &Context, _proj: &Project, args: &[String]) -> Result<(), RunnerError> {
    let target = self.target()?;

    let path = match which::which("avr-gcc") {
      Ok(gcc) => {
        debug!(gcc = %gcc.display(), "using installed toolchain");
        None
      }
      Err(_) => Some(self.bootstrap_toolchain(ctx).await?),
    };

    exec::run(&make_cmd(ctx, target, args, path)).await?;
    Ok(())
  }

  pub async fn collect(&mut self, ctx: &Context, proj: &Project, _args: &[String]) -> Result<Vec<String>, RunnerError> {
    let target = self.target()?;
    let root = ctx.build_dir.join(ROOT_DIR);

    let mut entries: Vec<String> = regular_files(&root)?
      .into_iter()
      .filter(|n| n.ends_with(".hex") || n.ends_with(".elf"))
      .collect();

    if let Some(license) = find_license(&ctx.src_dir) {
      copy_file(&ctx.src_dir.join(license), &root.join("license.txt"))?;
      entries.push("license.txt".to_string());
    }
    if let Some(readme) = find_readme(&ctx.src_dir) {
      copy_file(&ctx.src_dir.join(readme), &root.join("readme.txt"))?;
      entries.push("readme.txt".to_string());
    }

    let prefix = archive_prefix(proj, target);
    let name = write_archive(ArchiveFormat::TarGz, &root, &ctx.build_dir, &prefix, &entries)?;
    Ok(vec![name])
  }

  fn target(&self) -> Result<&FirmwareTarget, RunnerError> {
    self.target.as_ref().ok_or(RunnerError::NotPrepared(NAME))
  }

  /// Download and unpack the host's toolchain into the build directory.
  /// Returns the `PATH` value that puts it first.
  async fn bootstrap_toolchain(&self, ctx: &Context) -> Result<String, RunnerError> {
    let index_url = format!("{}/LATEST/", self.base_url);
    info!(index = %index_url, "avr-gcc not found, bootstrapping toolchain");

    let index = fetch(&index_url).await?;
    let index = String::from_utf8_lossy(&index);

    let (os, arch) = (Os::host(), Arch::host());
    let toolchain = match (os, arch) {
      (Some(os), Some(arch)) => select_toolchain(&index, &self.base_url, os, arch),
      _ => None,
    }
    .ok_or_else(|| RunnerError::ToolchainNotFound {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })?;

    download(&toolchain.url, &ctx.build_dir.join(&toolchain.file)).await?;
    exec::run(
      &Cmd::new("tar")
        .args(["-xf", toolchain.file.as_str()])
        .current_dir(&ctx.build_dir),
    )
    .await?;

    let bin = ctx.build_dir.join("avr").join("bin");
    prepend_path(&bin, std::env::var_os("PATH"))
  }
}

/// `<name>[-<mcu>][-debug]-<version>`; the MCU is left out for `dist-avr`.
pub fn archive_prefix(proj: &Project, target: &FirmwareTarget) -> String {
  let mut prefix = proj.name.clone();
  if target.has_explicit_mcu() {
    prefix.push('-');
    prefix.push_str(&target.mcu);
  }
  if target.debug {
    prefix.push_str("-debug");
  }
  prefix.push('-');
  prefix.push_str(&proj.version);
  prefix
}

/// `make -j<N> <args>` in the source directory, writing into
/// `<build>/__root__`.
pub fn make_cmd(ctx: &Context, target: &FirmwareTarget, args: &[String], path: Option<String>) -> Cmd {
  let mut cmd = Cmd::new("make")
    .arg(make_jobs_flag())
    .args(args.iter().cloned())
    .current_dir(&ctx.src_dir)
    .env("BUILDDIR", ctx.build_dir.join(ROOT_DIR).to_string_lossy());
  if let Some(path) = path {
    cmd = cmd.env("PATH", path);
  }
  if target.has_explicit_mcu() {
    cmd = cmd.env("AVR_MCU", &target.mcu);
  }
  if !target.debug {
    cmd = cmd.env("AVR_RELEASE", "1");
  }
  cmd
}

/// Pick the tarball for `os`/`arch` from the release index HTML. The URL
/// points into the release's own directory under `base_url`.
///
/// The last matching entry wins.
pub fn select_toolchain(index: &str, base_url: &str, os: Os, arch: Arch) -> Option<Toolchain> {
  TARBALL
    .captures_iter(index)
    .filter(|caps| &caps[2] == os.as_str() && &caps[3] == arch.as_str())
    .last()
    .map(|caps| Toolchain {
      file: caps[1].to_string(),
      url: format!("{}/avr-toolchain-{}/{}", base_url, &caps[4], &caps[1]),
    })
}

fn prepend_path(dir: &Path, current: Option<OsString>) -> Result<String, RunnerError> {
  let mut paths: Vec<PathBuf> = vec![dir.to_path_buf()];
  if let Some(current) = current {
    paths.extend(std::env::split_paths(&current));
  }
  let joined = std::env::join_paths(paths).map_err(std::io::Error::other)?;
  Ok(joined.to_string_lossy().into_owned())
}

fn fetch_err(url: &str, message: String) -> RunnerError {
  RunnerError::FetchFailed {
    url: url.to_string(),
    message,
  }
}

async fn get(url: &str) -> Result<reqwest::Response, RunnerError> {
  let response = reqwest::get(url).await.map_err(|e| fetch_err(url, e.to_string()))?;
  if !response.status().is_success() {
    return Err(fetch_err(url, format!("HTTP {}", response.status())));
  }
  Ok(response)
}

async fn fetch(url: &str) -> Result<Vec<u8>, RunnerError> {
  let bytes = get(url).await?.bytes().await.map_err(|e| fetch_err(url, e.to_string()))?;
  Ok(bytes.to_vec())
}

/// Stream `url` into `dest` chunk by chunk.
async fn download(url: &str, dest: &Path) -> Result<(), RunnerError> {
  info!(url = %url, "downloading toolchain");
  let mut response = get(url).await?;

  let mut file = tokio::fs::File::create(dest).await?;
  let mut size = 0u64;
  while let Some(chunk) = response.chunk().await.map_err(|e| fetch_err(url, e.to_string()))? {
    file.write_all(&chunk).await?;
    size += chunk.len() as u64;
  }
  file.flush().await?;

  info!(path = %dest.display(), size, "download complete");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  const INDEX: &str = r#"<html><body>
<a href="avr-toolchain-linux-amd64-42.tar.xz">avr-toolchain-linux-amd64-42.tar.xz</a>
<a href="avr-toolchain-linux-arm64-42.tar.xz">avr-toolchain-linux-arm64-42.tar.xz</a>
<a href="avr-toolchain-darwin-amd64-42.tar.xz">avr-toolchain-darwin-amd64-42.tar.xz</a>
</body></html>"#;

  fn firmware(name: &str) -> FirmwareTarget {
    FirmwareTarget::parse(name, NAME).unwrap()
  }

  #[test]
  fn detects_dwtk_config() {
    let temp = tempdir().unwrap();
    let ctx = Context::new("dist-avr", temp.path(), temp.path().join("build"));
    assert!(!detect(&ctx));
    fs::write(temp.path().join("dwtk-config.mk"), "").unwrap();
    assert!(detect(&ctx));
  }

  #[test]
  fn selects_toolchain_matching_os_and_arch() {
    let tc = select_toolchain(INDEX, TOOLCHAIN_BASE_URL, Os::Linux, Arch::Arm64).unwrap();
    assert_eq!(tc.file, "avr-toolchain-linux-arm64-42.tar.xz");
    assert_eq!(
      tc.url,
      "https://distfiles.rgm.io/avr-toolchain/avr-toolchain-42/avr-toolchain-linux-arm64-42.tar.xz"
    );

    assert!(select_toolchain(INDEX, TOOLCHAIN_BASE_URL, Os::Windows, Arch::Amd64).is_none());
    assert!(select_toolchain(INDEX, TOOLCHAIN_BASE_URL, Os::Darwin, Arch::Arm64).is_none());
  }

  #[test]
  fn archive_prefix_variants() {
    let proj = Project::new("blink", "0.2");
    assert_eq!(archive_prefix(&proj, &firmware("dist-avr")), "blink-0.2");
    assert_eq!(archive_prefix(&proj, &firmware("dist-avr-debug")), "blink-debug-0.2");
    assert_eq!(
      archive_prefix(&proj, &firmware("dist-atmega328p-debug")),
      "blink-atmega328p-debug-0.2"
    );
  }

  #[test]
  fn make_cmd_environment() {
    let ctx = Context::new("dist-attiny85", "/src/blink", "/src/blink/build");
    let cmd = make_cmd(&ctx, &firmware("dist-attiny85"), &[], Some("/tc/bin".to_string()));
    assert_eq!(cmd.get_env("BUILDDIR"), Some("/src/blink/build/__root__"));
    assert_eq!(cmd.get_env("AVR_MCU"), Some("attiny85"));
    assert_eq!(cmd.get_env("AVR_RELEASE"), Some("1"));
    assert_eq!(cmd.get_env("PATH"), Some("/tc/bin"));

    let cmd = make_cmd(&ctx, &firmware("dist-avr-debug"), &[], None);
    assert_eq!(cmd.get_env("AVR_MCU"), None);
    assert_eq!(cmd.get_env("AVR_RELEASE"), None);
    assert_eq!(cmd.get_env("PATH"), None);
  }

  #[cfg(unix)]
  #[test]
  fn prepend_path_puts_toolchain_first() {
    let joined = prepend_path(Path::new("/b/avr/bin"), Some(OsString::from("/usr/bin:/bin"))).unwrap();
    assert_eq!(joined, "/b/avr/bin:/usr/bin:/bin");
    assert_eq!(prepend_path(Path::new("/x"), None).unwrap(), "/x");
  }

  #[test]
  fn prepare_rejects_dist_triples() {
    let mut runner = DwtkRunner::default();
    let ctx = Context::new("distcheck", "/src", "/src/build");
    assert!(matches!(runner.prepare(&ctx), Err(RunnerError::Target(_))));
  }

  #[tokio::test]
  async fn fetch_reports_http_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("GET", "/LATEST/").with_status(404).create_async().await;

    let err = fetch(&format!("{}/LATEST/", server.url())).await.unwrap_err();
    assert!(matches!(err, RunnerError::FetchFailed { .. }));
    assert!(err.to_string().contains("404"));
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn download_writes_body_to_disk() {
    let temp = tempdir().unwrap();
    let body = vec![7u8; 200_000];
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/avr-toolchain-42/tc.tar.xz")
      .with_body(body.clone())
      .create_async()
      .await;

    let dest = temp.path().join("tc.tar.xz");
    download(&format!("{}/avr-toolchain-42/tc.tar.xz", server.url()), &dest)
      .await
      .unwrap();
    assert_eq!(fs::read(&dest).unwrap(), body);
  }

  /// Uncompressed tarball with a fake `make` that records how it was run.
  #[cfg(unix)]
  fn toolchain_tarball() -> Vec<u8> {
    let script = b"#!/bin/sh\nmkdir -p \"$BUILDDIR\"\nenv > \"$BUILDDIR/make.env\"\necho \"$@\" > \"$BUILDDIR/make.args\"\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, "avr/bin/make", &script[..]).unwrap();
    builder.into_inner().unwrap()
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn task_bootstraps_toolchain_when_avr_gcc_is_missing() {
    let (Some(os), Some(arch)) = (Os::host(), Arch::host()) else {
      return;
    };
    if which::which("avr-gcc").is_ok() {
      return;
    }
    let file = format!("avr-toolchain-{}-{}-7.tar.xz", os.as_str(), arch.as_str());

    let mut server = mockito::Server::new_async().await;
    let index = server
      .mock("GET", "/LATEST/")
      .with_body(format!(r#"<a href="{0}">{0}</a>"#, file))
      .create_async()
      .await;
    let tarball = server
      .mock("GET", format!("/avr-toolchain-7/{}", file).as_str())
      .with_body(toolchain_tarball())
      .create_async()
      .await;

    let temp = tempdir().unwrap();
    let src = temp.path().join("blink");
    let build = src.join("build");
    fs::create_dir_all(&build).unwrap();
    fs::write(src.join("dwtk-config.mk"), "").unwrap();

    let ctx = Context::new("dist-atmega328p", &src, &build);
    let mut runner = DwtkRunner {
      base_url: server.url(),
      ..DwtkRunner::default()
    };
    runner.prepare(&ctx).unwrap();
    runner
      .task(&ctx, &Project::new("blink", "1.0"), &["all".to_string()])
      .await
      .unwrap();

    index.assert_async().await;
    tarball.assert_async().await;
    assert!(build.join(&file).is_file());

    let root = build.join(ROOT_DIR);
    let args = fs::read_to_string(root.join("make.args")).unwrap();
    assert!(args.trim_end().ends_with("all"));
    let env = fs::read_to_string(root.join("make.env")).unwrap();
    assert!(env.contains("AVR_MCU=atmega328p"));
    assert!(env.contains("AVR_RELEASE=1"));
    let path = format!("PATH={}", build.join("avr").join("bin").display());
    assert!(env.lines().any(|line| line.starts_with(&path)));
  }

  #[tokio::test]
  async fn collect_archives_firmware_from_root() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("blink");
    let build = src.join("build");
    let root = build.join(ROOT_DIR);
    fs::create_dir_all(&root).unwrap();
    fs::write(src.join("LICENSE"), "BSD").unwrap();
    fs::write(root.join("blink.hex"), ":00000001FF").unwrap();
    fs::write(root.join("blink.elf"), "\x7fELF").unwrap();
    fs::write(root.join("blink.o"), "obj").unwrap();

    let ctx = Context::new("dist-atmega328p", &src, &build);
    let mut runner = DwtkRunner::default();
    runner.prepare(&ctx).unwrap();
    let artifacts = runner.collect(&ctx, &Project::new("blink", "1.0"), &[]).await.unwrap();
    assert_eq!(artifacts, vec!["blink-atmega328p-1.0.tar.gz"]);

    let file = fs::File::open(build.join(&artifacts[0])).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut names: Vec<String> = archive
      .entries()
      .unwrap()
      .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
      .collect();
    names.sort();
    assert_eq!(
      names,
      vec![
        "blink-atmega328p-1.0/blink.elf",
        "blink-atmega328p-1.0/blink.hex",
        "blink-atmega328p-1.0/license.txt",
      ]
    );
  }
}
