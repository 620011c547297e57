pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use std::fmt;

use crate::archive::ArchiveFormat;

/// Cross-compilation platform: OS, architecture and, for 32-bit ARM, the
/// architecture revision (e.g. "linux-armv7").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  pub arm: Option<u8>,
}

impl Platform {
  pub const fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch, arm: None }
  }

  /// 32-bit ARM at the given revision.
  pub const fn arm(os: Os, variant: u8) -> Self {
    Self {
      os,
      arch: Arch::Arm,
      arm: Some(variant),
    }
  }

  /// Detect the platform this process runs on, without an ARM revision.
  pub fn host() -> Option<Self> {
    Some(Self::new(Os::host()?, Arch::host()?))
  }

  /// Architecture as spelled in target names, e.g. "amd64" or "armv7".
  pub fn arch_name(&self) -> String {
    match self.arm {
      Some(v) => format!("{}v{}", self.arch, v),
      None => self.arch.to_string(),
    }
  }

  /// `<os>-<arch>` as spelled in target names, e.g. "linux-armv7".
  pub fn name(&self) -> String {
    format!("{}-{}", self.os, self.arch_name())
  }

  pub fn is_windows(&self) -> bool {
    self.os == Os::Windows
  }

  /// Zip for Windows, gzip-compressed tar everywhere else.
  pub fn archive_format(&self) -> ArchiveFormat {
    if self.is_windows() {
      ArchiveFormat::Zip
    } else {
      ArchiveFormat::TarGz
    }
  }

  /// Suffix the toolchain appends to produced executables.
  pub fn exe_suffix(&self) -> &'static str {
    if self.is_windows() { ".exe" } else { "" }
  }

  /// `GOOS`, `GOARCH` and, for ARM revisions, `GOARM`.
  pub fn go_env(&self) -> Vec<(&'static str, String)> {
    let mut env = vec![("GOOS", self.os.to_string()), ("GOARCH", self.arch.to_string())];
    if let Some(v) = self.arm {
      env.push(("GOARM", v.to_string()));
    }
    env
  }

  pub fn is_supported(&self) -> bool {
    SUPPORTED.contains(self)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Every platform a `dist-<os>-<arch>` target may name.
pub const SUPPORTED: &[Platform] = &[
  Platform::new(Os::Android, Arch::Arm),
  Platform::new(Os::Darwin, Arch::I386),
  Platform::new(Os::Darwin, Arch::Amd64),
  Platform::arm(Os::Darwin, 5),
  Platform::arm(Os::Darwin, 6),
  Platform::arm(Os::Darwin, 7),
  Platform::new(Os::Darwin, Arch::Arm64),
  Platform::new(Os::Dragonfly, Arch::Amd64),
  Platform::new(Os::FreeBsd, Arch::I386),
  Platform::new(Os::FreeBsd, Arch::Amd64),
  Platform::arm(Os::FreeBsd, 5),
  Platform::arm(Os::FreeBsd, 6),
  Platform::arm(Os::FreeBsd, 7),
  Platform::new(Os::Linux, Arch::I386),
  Platform::new(Os::Linux, Arch::Amd64),
  Platform::arm(Os::Linux, 5),
  Platform::arm(Os::Linux, 6),
  Platform::arm(Os::Linux, 7),
  Platform::new(Os::Linux, Arch::Arm64),
  Platform::new(Os::Linux, Arch::Ppc64),
  Platform::new(Os::Linux, Arch::Ppc64le),
  Platform::new(Os::Linux, Arch::Mips),
  Platform::new(Os::Linux, Arch::Mipsle),
  Platform::new(Os::Linux, Arch::Mips64),
  Platform::new(Os::Linux, Arch::Mips64le),
  Platform::new(Os::Linux, Arch::S390x),
  Platform::new(Os::NetBsd, Arch::I386),
  Platform::new(Os::NetBsd, Arch::Amd64),
  Platform::arm(Os::NetBsd, 5),
  Platform::arm(Os::NetBsd, 6),
  Platform::arm(Os::NetBsd, 7),
  Platform::new(Os::OpenBsd, Arch::I386),
  Platform::new(Os::OpenBsd, Arch::Amd64),
  Platform::arm(Os::OpenBsd, 5),
  Platform::arm(Os::OpenBsd, 6),
  Platform::arm(Os::OpenBsd, 7),
  Platform::new(Os::Plan9, Arch::I386),
  Platform::new(Os::Plan9, Arch::Amd64),
  Platform::new(Os::Solaris, Arch::Amd64),
  Platform::new(Os::Windows, Arch::I386),
  Platform::new(Os::Windows, Arch::Amd64),
];
