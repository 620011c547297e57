//! distfiles-api publisher: multipart upload of each artifact with its
//! SHA-512 digest.
//!
//! Artifacts are read twice, once to hash and once streamed into the request
//! body, so no artifact is held in memory whole.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha512};
use tokio::io::AsyncReadExt;
use tracing::info;

use super::{CiEnv, PublishError};
use crate::context::{Context, Project};
use crate::fs::glob_matches;

pub const NAME: &str = "distfiles-api";

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DistfilesApi {
  url: String,
  client: reqwest::Client,
}

impl DistfilesApi {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      client: reqwest::Client::new(),
    }
  }

  /// Bound when `DISTFILES_URL` is set and not blank.
  pub fn detect(env: &CiEnv) -> Option<Self> {
    let url = env.get("DISTFILES_URL")?.trim();
    (!url.is_empty()).then(|| Self::new(url))
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub async fn publish(
    &self,
    ctx: &Context,
    proj: &Project,
    artifacts: &[String],
    extract_glob: Option<&str>,
  ) -> Result<(), PublishError> {
    for artifact in artifacts {
      let extract = extract_glob.is_some_and(|pattern| glob_matches(pattern, artifact));
      self.upload(&ctx.build_dir.join(artifact), artifact, proj, extract).await?;
    }
    Ok(())
  }

  async fn upload(&self, path: &Path, artifact: &str, proj: &Project, extract: bool) -> Result<(), PublishError> {
    info!(%artifact, url = %self.url, extract, "uploading artifact");

    let read_err = |source: std::io::Error| PublishError::Read {
      path: path.to_path_buf(),
      source,
    };
    let (digest, len) = file_digest(path).await.map_err(read_err)?;
    let file = tokio::fs::File::open(path).await.map_err(read_err)?;
    let part = Part::stream_with_length(reqwest::Body::from(file), len).file_name(artifact.to_string());

    let form = Form::new()
      .part("file", part)
      .text("project", proj.name.clone())
      .text("version", proj.version.clone())
      .text("sha512", format!("{}  {}", digest, artifact))
      .text("extract", extract.to_string());

    let http_err = |source| PublishError::Http {
      artifact: artifact.to_string(),
      source,
    };
    let response = self
      .client
      .post(&self.url)
      .multipart(form)
      .send()
      .await
      .map_err(http_err)?;
    let status = response.status();
    let body = response.text().await.map_err(http_err)?;

    if !status.is_success() {
      return Err(PublishError::Rejected {
        artifact: artifact.to_string(),
        status: status.as_u16(),
        body: body.trim_matches([' ', '\t', '\n']).to_string(),
      });
    }

    info!(%artifact, status = status.as_u16(), "upload complete");
    Ok(())
  }
}

/// Hash a file in fixed-size chunks. Returns its lowercase hex SHA-512 and
/// its length in bytes.
pub async fn file_digest(path: &Path) -> std::io::Result<(String, u64)> {
  let mut file = tokio::fs::File::open(path).await?;
  let mut hasher = Sha512::new();
  let mut len = 0u64;
  let mut chunk = vec![0u8; CHUNK_SIZE];

  loop {
    let n = file.read(&mut chunk).await?;
    if n == 0 {
      break;
    }
    hasher.update(&chunk[..n]);
    len += n as u64;
  }

  Ok((hex::encode(hasher.finalize()), len))
}
