use std::fmt;

/// CPU architectures a distribution target can be cross-compiled for.
///
/// Identifiers follow the Go toolchain's `GOARCH` spelling. ARM variants
/// (`armv5`, `armv6`, `armv7`) are [`Arch::Arm`] plus a variant number held
/// by [`super::Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
  I386,
  Amd64,
  Arm,
  Arm64,
  Ppc64,
  Ppc64le,
  Mips,
  Mipsle,
  Mips64,
  Mips64le,
  S390x,
}

impl Arch {
  pub const ALL: [Arch; 11] = [
    Arch::I386,
    Arch::Amd64,
    Arch::Arm,
    Arch::Arm64,
    Arch::Ppc64,
    Arch::Ppc64le,
    Arch::Mips,
    Arch::Mipsle,
    Arch::Mips64,
    Arch::Mips64le,
    Arch::S390x,
  ];

  /// Detect the CPU architecture this process runs on.
  pub fn host() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::I386),
      "x86_64" => Some(Self::Amd64),
      "arm" => Some(Self::Arm),
      "aarch64" => Some(Self::Arm64),
      "powerpc64" if cfg!(target_endian = "little") => Some(Self::Ppc64le),
      "powerpc64" => Some(Self::Ppc64),
      "mips" if cfg!(target_endian = "little") => Some(Self::Mipsle),
      "mips" => Some(Self::Mips),
      "mips64" if cfg!(target_endian = "little") => Some(Self::Mips64le),
      "mips64" => Some(Self::Mips64),
      "s390x" => Some(Self::S390x),
      _ => None,
    }
  }

  /// Lowercase identifier as used in target names and `GOARCH`.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::I386 => "386",
      Self::Amd64 => "amd64",
      Self::Arm => "arm",
      Self::Arm64 => "arm64",
      Self::Ppc64 => "ppc64",
      Self::Ppc64le => "ppc64le",
      Self::Mips => "mips",
      Self::Mipsle => "mipsle",
      Self::Mips64 => "mips64",
      Self::Mips64le => "mips64le",
      Self::S390x => "s390x",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|arch| arch.as_str() == s)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_round_trips_every_arch() {
    for arch in Arch::ALL {
      assert_eq!(Arch::parse(arch.as_str()), Some(arch));
    }
  }

  #[test]
  fn x86_uses_go_spelling() {
    assert_eq!(Arch::I386.as_str(), "386");
    assert_eq!(Arch::parse("x86_64"), None);
  }
}
