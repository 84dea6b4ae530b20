//! Client configuration, layered: built-in defaults, then an optional TOML
//! file, then `DOCCHAT_*` environment variables.

use std::{path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// Base URL of the docchat backend (`DOCCHAT_BACKEND_URL`).
  pub backend_url:          String,
  /// Per-request timeout in seconds (`DOCCHAT_REQUEST_TIMEOUT_SECS`).
  pub request_timeout_secs: u64,
  /// Where the session database lives (`DOCCHAT_SESSION_DB`). Front-ends
  /// pick a platform default when unset.
  #[serde(default)]
  pub session_db:           Option<PathBuf>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      backend_url:          DEFAULT_BACKEND_URL.to_owned(),
      request_timeout_secs: DEFAULT_TIMEOUT_SECS,
      session_db:           None,
    }
  }
}

impl ClientConfig {
  /// Resolve the configuration once at startup. A missing `file` is not an
  /// error.
  pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
    let mut builder = config::Config::builder()
      .set_default("backend_url", DEFAULT_BACKEND_URL)?
      .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?;

    if let Some(path) = file {
      builder = builder.add_source(config::File::from(path).required(false));
    }

    builder
      .add_source(config::Environment::with_prefix("DOCCHAT").try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}
