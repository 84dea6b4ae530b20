//! Error types for `docchat-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The request never produced an HTTP response (DNS, connect, timeout).
  #[error("network error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The backend answered with a non-success status. `message` is the
  /// backend's own explanation when the body carried one.
  #[error("{message}")]
  Rejected { status: u16, message: String },

  #[error("unexpected response: {0}")]
  Decode(String),

  #[error("session storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("no signed-in identity to verify")]
  NoPendingIdentity,

  #[error("OTP verification failed")]
  OtpRejected,

  #[error("{0}")]
  InvalidForm(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True when the backend refused the credential. Nothing in the client
  /// demotes the session on this; front-ends may choose to.
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, Self::Rejected { status: 401, .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejected_displays_backend_message_only() {
    let err = Error::Rejected {
      status:  422,
      message: "Email already registered".into(),
    };
    assert_eq!(err.to_string(), "Email already registered");
    assert!(!err.is_unauthorized());
  }

  #[test]
  fn unauthorized_is_detected_by_status() {
    let err = Error::Rejected { status: 401, message: "jwt expired".into() };
    assert!(err.is_unauthorized());
    assert!(!Error::OtpRejected.is_unauthorized());
  }
}
