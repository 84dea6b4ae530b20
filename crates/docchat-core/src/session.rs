//! Session — who the running client is signed in as.
//!
//! The signed-in pair (user + token) only exists inside
//! [`Session::Authenticated`], so it is impossible to hold one half of it.
//! Flat accessors give the `{ user, token, status }` view consumers expect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation owner used when nobody is signed in.
pub const GUEST: &str = "guest";

// ─── User ────────────────────────────────────────────────────────────────────

/// A user profile as issued by the backend. Replaced wholesale, never
/// patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  #[serde(alias = "_id")]
  pub id:    String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:  Option<String>,
}

// ─── Credential ──────────────────────────────────────────────────────────────

/// An opaque bearer token. Never parsed or validated client-side.
///
/// `Debug` is redacted so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
  pub fn new(token: impl Into<String>) -> Self { Self(token.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Credential(<redacted>)")
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SessionStatus {
  Initializing,
  Anonymous,
  Authenticated,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// The authentication state held by the running client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
  /// Persistent storage has not been consulted yet. Nobody may make an
  /// auth decision in this state.
  #[default]
  Initializing,
  Anonymous,
  Authenticated { user: User, token: Credential },
}

impl Session {
  pub fn status(&self) -> SessionStatus {
    match self {
      Self::Initializing => SessionStatus::Initializing,
      Self::Anonymous => SessionStatus::Anonymous,
      Self::Authenticated { .. } => SessionStatus::Authenticated,
    }
  }

  pub fn user(&self) -> Option<&User> {
    match self {
      Self::Authenticated { user, .. } => Some(user),
      _ => None,
    }
  }

  pub fn token(&self) -> Option<&Credential> {
    match self {
      Self::Authenticated { token, .. } => Some(token),
      _ => None,
    }
  }

  /// `false` only while [`Session::Initializing`].
  pub fn is_resolved(&self) -> bool { !matches!(self, Self::Initializing) }

  pub fn is_authenticated(&self) -> bool {
    matches!(self, Self::Authenticated { .. })
  }

  /// The identity half of a conversation key: the user id, or `"guest"`.
  pub fn conversation_owner(&self) -> &str {
    self.user().map(|u| u.id.as_str()).unwrap_or(GUEST)
  }
}

// ─── Conversation key ────────────────────────────────────────────────────────

/// Scopes a message history: caller identity × selected document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
  pub owner:  String,
  pub doc_id: String,
}

impl ConversationKey {
  pub fn new(session: &Session, doc_id: impl Into<String>) -> Self {
    Self {
      owner:  session.conversation_owner().to_owned(),
      doc_id: doc_id.into(),
    }
  }
}
