use std::fmt;

/// Operating systems a distribution target can be cross-compiled for.
///
/// Identifiers follow the Go toolchain's `GOOS` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
  Android,
  Darwin,
  Dragonfly,
  FreeBsd,
  Linux,
  NetBsd,
  OpenBsd,
  Plan9,
  Solaris,
  Windows,
}

impl Os {
  pub const ALL: [Os; 10] = [
    Os::Android,
    Os::Darwin,
    Os::Dragonfly,
    Os::FreeBsd,
    Os::Linux,
    Os::NetBsd,
    Os::OpenBsd,
    Os::Plan9,
    Os::Solaris,
    Os::Windows,
  ];

  /// Detect the operating system this process runs on.
  pub fn host() -> Option<Self> {
    match std::env::consts::OS {
      "android" => Some(Self::Android),
      "macos" => Some(Self::Darwin),
      "dragonfly" => Some(Self::Dragonfly),
      "freebsd" => Some(Self::FreeBsd),
      "linux" => Some(Self::Linux),
      "netbsd" => Some(Self::NetBsd),
      "openbsd" => Some(Self::OpenBsd),
      "solaris" => Some(Self::Solaris),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Lowercase identifier as used in target names.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Android => "android",
      Self::Darwin => "darwin",
      Self::Dragonfly => "dragonfly",
      Self::FreeBsd => "freebsd",
      Self::Linux => "linux",
      Self::NetBsd => "netbsd",
      Self::OpenBsd => "openbsd",
      Self::Plan9 => "plan9",
      Self::Solaris => "solaris",
      Self::Windows => "windows",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|os| os.as_str() == s)
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
