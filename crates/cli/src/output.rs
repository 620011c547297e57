//! CLI output formatting utilities.
//!
//! Colored status lines for the run summary. Logs go to stderr through
//! `tracing`; these helpers are for the human-facing summary only.

use owo_colors::{OwoColorize, Stream};

use distrun_lib::pipeline::PublishOutcome;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn format_outcome(outcome: &PublishOutcome) -> String {
  match outcome {
    PublishOutcome::Published { publisher, artifacts: 1 } => format!("uploaded 1 file to {}", publisher),
    PublishOutcome::Published { publisher, artifacts } => format!("uploaded {} files to {}", artifacts, publisher),
    PublishOutcome::Skipped(reason) => format!("skipped ({})", reason),
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}
