mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{Paths, cmd_detect, cmd_platforms, cmd_run};
use output::print_error;

/// distrun - build and release orchestrator for CI pipelines
#[derive(Parser)]
#[command(name = "distrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Source checkout to build (default: current directory)
  #[arg(long, global = true)]
  source_dir: Option<PathBuf>,

  /// Build output directory, wiped before every run (default: <source>/build)
  #[arg(long, global = true)]
  build_dir: Option<PathBuf>,

  /// Config file (default: <source>/.distrun.yml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the full pipeline for a target
  Run {
    /// Target name, e.g. dist-linux-amd64 or distcheck
    #[arg(short, long, env = "TARGET")]
    target: String,

    /// Do not fetch full git history for shallow checkouts
    #[arg(long)]
    skip_unshallow: bool,
  },

  /// Select the runner and publisher for a target without building
  Detect {
    #[arg(short, long, env = "TARGET", default_value = "dist")]
    target: String,
  },

  /// List the platforms accepted in dist-<os>-<arch> targets
  Platforms,
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match cli.command {
    Commands::Platforms => {
      cmd_platforms();
      Ok(true)
    }
    Commands::Run { target, skip_unshallow } => Paths::resolve(cli.source_dir, cli.build_dir, cli.config)
      .and_then(|paths| cmd_run(&paths, &target, skip_unshallow)),
    Commands::Detect { target } => {
      Paths::resolve(cli.source_dir, cli.build_dir, cli.config).and_then(|paths| cmd_detect(&paths, &target))
    }
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
