//! Target-name grammar.
//!
//! A target name carries the whole build intent of an invocation. Runners
//! parse it once, before any external tool runs, into one of the typed forms
//! below:
//!
//! - `distcheck` runs the project's tests.
//! - `dist-<os>-<arch>[-debug]` cross-compiles for a platform from the
//!   support matrix. An `armv<N>` architecture selects 32-bit ARM revision N.
//! - `dist-<mcu>[-debug]` builds firmware for a microcontroller.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::platform::Platform;
use crate::platform::arch::Arch;
use crate::platform::os::Os;

/// Target name that runs the test suite instead of producing a distribution.
pub const CHECK_TARGET: &str = "distcheck";

static DIST_TARGET: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^dist-([a-z0-9]+)-([a-z0-9]+)(-debug)?$").expect("valid regex"));

static FIRMWARE_TARGET: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^dist-([a-z0-9]+)(-debug)?$").expect("valid regex"));

/// Errors from parsing a target name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
  /// The name does not follow the runner's target grammar.
  #[error("invalid target name for {runner}: {target}")]
  Malformed { runner: &'static str, target: String },

  /// The name is well formed but names a platform outside the support matrix.
  #[error("unsupported dist target for {runner}: {target}")]
  Unsupported { runner: &'static str, target: String },
}

/// What a target asks the build system to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAction {
  Test,
  Build,
}

/// A parsed cross-compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
  pub action: TargetAction,
  /// Set for [`TargetAction::Build`].
  pub platform: Option<Platform>,
  pub debug: bool,
}

impl Target {
  /// Parse `distcheck` or `dist-<os>-<arch>[-debug]`.
  ///
  /// `runner` names the grammar's owner in error messages.
  pub fn parse(name: &str, runner: &'static str) -> Result<Self, TargetError> {
    if name == CHECK_TARGET {
      return Ok(Self {
        action: TargetAction::Test,
        platform: None,
        debug: false,
      });
    }

    let caps = DIST_TARGET.captures(name).ok_or_else(|| TargetError::Malformed {
      runner,
      target: name.to_string(),
    })?;

    let unsupported = || TargetError::Unsupported {
      runner,
      target: name.to_string(),
    };

    let os = Os::parse(&caps[1]).ok_or_else(unsupported)?;
    let platform = parse_arch(os, &caps[2]).ok_or_else(unsupported)?;
    if !platform.is_supported() {
      return Err(unsupported());
    }

    Ok(Self {
      action: TargetAction::Build,
      platform: Some(platform),
      debug: caps.get(3).is_some(),
    })
  }

  pub fn is_windows(&self) -> bool {
    self.platform.is_some_and(|p| p.is_windows())
  }
}

fn parse_arch(os: Os, arch: &str) -> Option<Platform> {
  if let Some(variant) = arch.strip_prefix("armv") {
    let n = variant.parse::<u8>().ok()?;
    // "armv07" is not a spelling of armv7
    if n.to_string() != variant {
      return None;
    }
    return Some(Platform::arm(os, n));
  }
  Some(Platform::new(os, Arch::parse(arch)?))
}

/// A parsed firmware target: `dist-<mcu>[-debug]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareTarget {
  pub mcu: String,
  pub debug: bool,
}

impl FirmwareTarget {
  /// MCU name meaning "whatever the project's own config selects".
  pub const DEFAULT_MCU: &'static str = "avr";

  pub fn parse(name: &str, runner: &'static str) -> Result<Self, TargetError> {
    let caps = FIRMWARE_TARGET.captures(name).ok_or_else(|| TargetError::Malformed {
      runner,
      target: name.to_string(),
    })?;
    Ok(Self {
      mcu: caps[1].to_string(),
      debug: caps.get(2).is_some(),
    })
  }

  /// Whether the target names a specific microcontroller.
  pub fn has_explicit_mcu(&self) -> bool {
    self.mcu != Self::DEFAULT_MCU
  }
}
