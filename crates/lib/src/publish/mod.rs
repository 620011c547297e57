//! Publishing gate and publishers.
//!
//! Whether a build may publish is decided from CI-provider environment
//! variables: pull requests never publish, and only pushes to `master` or
//! tags do. A tag push is a release. When the gate passes, the first
//! publisher in [`REGISTRY`] that finds its own configuration is bound.
//!
//! The environment is read once into a [`CiEnv`] snapshot so the decision is
//! deterministic for the whole run.

pub mod distfiles;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::context::{Context, Project};

pub use distfiles::DistfilesApi;

/// Environment variables the gate and the publishers look at.
pub const CI_VARS: &[&str] = &[
  "DISABLE_PUBLISHER",
  "TRAVIS",
  "TRAVIS_PULL_REQUEST",
  "TRAVIS_BRANCH",
  "TRAVIS_TAG",
  "GITHUB_EVENT_NAME",
  "GITHUB_REF",
  "DISTFILES_URL",
];

/// Immutable snapshot of the CI environment. Unset variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnv {
  vars: BTreeMap<String, String>,
}

impl CiEnv {
  /// Capture [`CI_VARS`] from the process environment.
  pub fn from_env() -> Self {
    Self::from_pairs(
      CI_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
    )
  }

  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  /// Value of `key`, or the empty string when unset.
  fn value(&self, key: &str) -> &str {
    self.get(key).unwrap_or("")
  }
}

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("failed to read artifact {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to upload {artifact}: {source}")]
  Http {
    artifact: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("failed to upload file to distfiles api: {artifact} ({status}: {body})")]
  Rejected { artifact: String, status: u16, body: String },
}

/// Identifies a publisher implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
  DistfilesApi,
}

/// Publishers in detection order.
pub const REGISTRY: [PublisherKind; 1] = [PublisherKind::DistfilesApi];

impl PublisherKind {
  pub fn name(&self) -> &'static str {
    match self {
      PublisherKind::DistfilesApi => distfiles::NAME,
    }
  }

  /// The configured publisher, if its settings are present in `env`.
  pub fn detect(&self, env: &CiEnv) -> Option<Publisher> {
    match self {
      PublisherKind::DistfilesApi => DistfilesApi::detect(env).map(Publisher::DistfilesApi),
    }
  }
}

/// A bound publisher.
#[derive(Debug, Clone)]
pub enum Publisher {
  DistfilesApi(DistfilesApi),
}

impl Publisher {
  pub fn name(&self) -> &'static str {
    match self {
      Publisher::DistfilesApi(_) => distfiles::NAME,
    }
  }

  /// Upload every artifact. The first failure aborts the rest.
  ///
  /// Artifacts matching `extract_glob` are flagged for extraction on the
  /// server side.
  pub async fn publish(
    &self,
    ctx: &Context,
    proj: &Project,
    artifacts: &[String],
    extract_glob: Option<&str>,
  ) -> Result<(), PublishError> {
    match self {
      Publisher::DistfilesApi(p) => p.publish(ctx, proj, artifacts, extract_glob).await,
    }
  }
}

/// Outcome of the publishing gate.
#[derive(Debug, Clone)]
pub enum PublisherDecision {
  /// Publishing allowed; `release` is set for tag pushes.
  Eligible { publisher: Publisher, release: bool },
  /// The CI environment rules publishing out.
  Ineligible(String),
  /// The environment allows publishing but no publisher is configured.
  NoPublisher,
}

impl PublisherDecision {
  pub fn publisher(&self) -> Option<&Publisher> {
    match self {
      PublisherDecision::Eligible { publisher, .. } => Some(publisher),
      _ => None,
    }
  }

  /// Why publishing will not happen, if it won't.
  pub fn reason(&self) -> Option<&str> {
    match self {
      PublisherDecision::Eligible { .. } => None,
      PublisherDecision::Ineligible(reason) => Some(reason.as_str()),
      PublisherDecision::NoPublisher => Some("no publisher available"),
    }
  }
}

/// Evaluate CI signals and bind the first detected publisher.
pub fn select_publisher(env: &CiEnv) -> PublisherDecision {
  let release = match check_environment(env) {
    Ok(release) => release,
    Err(reason) => {
      info!(%reason, "publishing disabled");
      return PublisherDecision::Ineligible(reason.to_string());
    }
  };

  for kind in REGISTRY {
    if let Some(publisher) = kind.detect(env) {
      info!(publisher = kind.name(), release, "publisher selected");
      return PublisherDecision::Eligible { publisher, release };
    }
    debug!(publisher = kind.name(), "publisher not configured");
  }
  PublisherDecision::NoPublisher
}

/// Ok(release) when CI signals allow publishing, Err(reason) otherwise.
fn check_environment(env: &CiEnv) -> Result<bool, &'static str> {
  let disable = env.value("DISABLE_PUBLISHER").to_lowercase();
  if matches!(disable.as_str(), "1" | "true" | "on") {
    return Err("disabled by DISABLE_PUBLISHER");
  }

  let mut release = false;

  if env.value("TRAVIS") == "true" {
    if env.value("TRAVIS_PULL_REQUEST") != "false" {
      return Err("pull request");
    }
    let tag = env.value("TRAVIS_TAG");
    if env.value("TRAVIS_BRANCH") != "master" && tag.is_empty() {
      return Err("not master branch nor a git tag");
    }
    release |= !tag.is_empty();
  }

  if let Some(event) = env.get("GITHUB_EVENT_NAME") {
    match event {
      "push" => {}
      "pull_request" | "pull_request_target" => return Err("pull request"),
      _ => return Err("not a push event"),
    }
    let git_ref = env.value("GITHUB_REF");
    let is_tag = git_ref.starts_with("refs/tags/");
    if git_ref != "refs/heads/master" && !is_tag {
      return Err("not master branch nor a git tag");
    }
    release |= is_tag;
  }

  Ok(release)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  fn env(pairs: &[(&str, &str)]) -> CiEnv {
    CiEnv::from_pairs(pairs.iter().copied())
  }

  const URL: (&str, &str) = ("DISTFILES_URL", "https://distfiles.example.com/api");

  #[test]
  fn no_ci_with_url_is_eligible() {
    let decision = select_publisher(&env(&[URL]));
    assert!(matches!(decision, PublisherDecision::Eligible { release: false, .. }));
    assert_eq!(decision.publisher().unwrap().name(), "distfiles-api");
    assert_eq!(decision.reason(), None);
  }

  #[test]
  fn no_url_means_no_publisher() {
    let decision = select_publisher(&env(&[("DISTFILES_URL", "   ")]));
    assert!(matches!(decision, PublisherDecision::NoPublisher));
    assert_eq!(decision.reason(), Some("no publisher available"));
  }

  #[test]
  fn disable_publisher_values() {
    for value in ["1", "true", "TRUE", "on", "On"] {
      let decision = select_publisher(&env(&[URL, ("DISABLE_PUBLISHER", value)]));
      assert_eq!(decision.reason(), Some("disabled by DISABLE_PUBLISHER"), "{value}");
    }
    let decision = select_publisher(&env(&[URL, ("DISABLE_PUBLISHER", "0")]));
    assert!(decision.publisher().is_some());
  }

  #[test]
  fn travis_pull_request() {
    let decision = select_publisher(&env(&[
      URL,
      ("TRAVIS", "true"),
      ("TRAVIS_PULL_REQUEST", "12"),
      ("TRAVIS_BRANCH", "master"),
    ]));
    assert_eq!(decision.reason(), Some("pull request"));
  }

  #[test]
  fn travis_branch_and_tag() {
    let base = [URL, ("TRAVIS", "true"), ("TRAVIS_PULL_REQUEST", "false")];

    let mut feature = base.to_vec();
    feature.push(("TRAVIS_BRANCH", "feature"));
    assert_eq!(
      select_publisher(&env(&feature)).reason(),
      Some("not master branch nor a git tag")
    );

    let mut master = base.to_vec();
    master.push(("TRAVIS_BRANCH", "master"));
    assert!(matches!(
      select_publisher(&env(&master)),
      PublisherDecision::Eligible { release: false, .. }
    ));

    let mut tag = base.to_vec();
    tag.extend([("TRAVIS_BRANCH", "v1.0"), ("TRAVIS_TAG", "v1.0")]);
    assert!(matches!(
      select_publisher(&env(&tag)),
      PublisherDecision::Eligible { release: true, .. }
    ));
  }

  #[test]
  fn github_pull_request() {
    for event in ["pull_request", "pull_request_target"] {
      let decision = select_publisher(&env(&[
        URL,
        ("GITHUB_EVENT_NAME", event),
        ("GITHUB_REF", "refs/pull/7/merge"),
      ]));
      assert_eq!(decision.reason(), Some("pull request"));
    }
  }

  #[test]
  fn github_other_events() {
    let decision = select_publisher(&env(&[URL, ("GITHUB_EVENT_NAME", "workflow_dispatch")]));
    assert_eq!(decision.reason(), Some("not a push event"));
  }

  #[test]
  fn github_push_refs() {
    let push = |git_ref: &str| select_publisher(&env(&[URL, ("GITHUB_EVENT_NAME", "push"), ("GITHUB_REF", git_ref)]));

    assert_eq!(push("refs/heads/dev").reason(), Some("not master branch nor a git tag"));
    assert!(matches!(
      push("refs/heads/master"),
      PublisherDecision::Eligible { release: false, .. }
    ));
    assert!(matches!(
      push("refs/tags/v2.0"),
      PublisherDecision::Eligible { release: true, .. }
    ));
  }

  #[test]
  fn gate_runs_before_detection() {
    let decision = select_publisher(&env(&[("GITHUB_EVENT_NAME", "pull_request")]));
    assert_eq!(decision.reason(), Some("pull request"));
  }

  #[test]
  fn decision_is_idempotent() {
    let snapshot = env(&[URL, ("GITHUB_EVENT_NAME", "push"), ("GITHUB_REF", "refs/tags/v1")]);
    for _ in 0..3 {
      assert!(matches!(
        select_publisher(&snapshot),
        PublisherDecision::Eligible { release: true, .. }
      ));
    }
  }

  #[test]
  #[serial]
  fn from_env_captures_only_ci_vars() {
    temp_env::with_vars(
      [
        ("GITHUB_EVENT_NAME", Some("push")),
        ("GITHUB_REF", Some("refs/heads/master")),
        ("DISTFILES_URL", Some("http://localhost/upload")),
        ("TRAVIS", None),
        ("DISABLE_PUBLISHER", None),
      ],
      || {
        let snapshot = CiEnv::from_env();
        assert_eq!(snapshot.get("GITHUB_EVENT_NAME"), Some("push"));
        assert_eq!(snapshot.get("TRAVIS"), None);
        assert_eq!(snapshot.get("PATH"), None);
        assert!(select_publisher(&snapshot).publisher().is_some());
      },
    );
  }

  #[test]
  #[serial]
  fn snapshot_ignores_later_changes() {
    temp_env::with_var("DISABLE_PUBLISHER", Some("1"), || {
      let snapshot = CiEnv::from_env();
      temp_env::with_var("DISABLE_PUBLISHER", None::<&str>, || {
        assert_eq!(snapshot.get("DISABLE_PUBLISHER"), Some("1"));
      });
    });
  }
}
