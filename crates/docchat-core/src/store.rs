//! The `SessionStore` trait — durable storage for at most one session.
//!
//! Implemented by storage backends (e.g. `docchat-store-sqlite`). The
//! session state machine depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::session::{Credential, User};

/// What survives a restart: the signed-in pair, always both halves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
  pub user:  User,
  pub token: Credential,
}

/// Durable storage holding at most one [`StoredSession`].
///
/// Implementations must make `save` and `clear` atomic with respect to
/// `load`: a reader never observes the user without the token or the token
/// without the user.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the stored session.
  ///
  /// Never fails: missing, partial or unparseable data and storage errors
  /// all read as `None`, so a corrupted session only forces a new login.
  fn load(&self) -> impl Future<Output = Option<StoredSession>> + Send + '_;

  /// Replace the stored session with `user` + `token`.
  fn save<'a>(
    &'a self,
    user: &'a User,
    token: &'a Credential,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove the stored session, if any.
  fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
