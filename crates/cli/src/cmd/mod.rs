mod detect;
mod platforms;
mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};

use distrun_lib::config::CONFIG_FILE;

pub use detect::cmd_detect;
pub use platforms::cmd_platforms;
pub use run::cmd_run;

/// Directories and files a command works on, after defaults are applied.
#[derive(Debug, Clone)]
pub struct Paths {
  pub source: PathBuf,
  pub build: PathBuf,
  pub config: PathBuf,
}

impl Paths {
  pub fn resolve(source: Option<PathBuf>, build: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self> {
    let source = match source {
      Some(dir) => dir,
      None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let source = dunce::canonicalize(&source)
      .with_context(|| format!("Source directory not found: {}", source.display()))?;

    // Tasks run with the source tree as cwd, so a relative build dir must not
    // be resolved against it.
    let build = match build {
      Some(dir) => std::path::absolute(&dir)
        .with_context(|| format!("Invalid build directory: {}", dir.display()))?,
      None => source.join("build"),
    };

    Ok(Self {
      build,
      config: config.unwrap_or_else(|| source.join(CONFIG_FILE)),
      source,
    })
  }
}
