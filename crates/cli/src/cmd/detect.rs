//! Dry dispatch: report which runner and publisher a run would use.

use anyhow::Result;

use distrun_lib::publish::{CiEnv, PublisherDecision, select_publisher};
use distrun_lib::runners::select_runner;

use super::Paths;
use crate::output::{print_info, print_stat, print_warning};

/// Selects the runner and parses the target with its grammar. The build
/// directory is reset, as for any dispatch.
pub fn cmd_detect(paths: &Paths, target: &str) -> Result<bool> {
  let (mut runner, ctx) = select_runner(target, &paths.source, &paths.build)?;
  runner.prepare(&ctx)?;

  print_info(&format!("{} accepts target {}", runner.name(), target));
  print_stat("Runner", runner.name());
  print_stat("Source", &ctx.src_dir.display().to_string());
  print_stat("Build", &ctx.build_dir.display().to_string());

  match select_publisher(&CiEnv::from_env()) {
    PublisherDecision::Eligible { publisher, release } => {
      print_stat("Publisher", publisher.name());
      print_stat("Release", &release.to_string());
    }
    PublisherDecision::Ineligible(reason) => {
      print_stat("Publisher", "none");
      print_warning(&format!("Publishing disabled: {}", reason));
    }
    PublisherDecision::NoPublisher => print_stat("Publisher", "none"),
  }

  Ok(true)
}
