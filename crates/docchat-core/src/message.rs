//! Chat messages exchanged within a conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

/// One turn of a conversation.
///
/// `ts` travels as epoch milliseconds. `editing` is view state only and is
/// never sent to or read from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub id:      String,
  pub role:    Role,
  pub content: String,
  #[serde(rename = "ts", with = "chrono::serde::ts_milliseconds")]
  pub timestamp: DateTime<Utc>,
  #[serde(skip)]
  pub editing: bool,
}

impl ChatMessage {
  /// A message created on this side, with a fresh v4 id and the current
  /// time.
  pub fn local(role: Role, content: impl Into<String>) -> Self {
    Self {
      id:        Uuid::new_v4().to_string(),
      role,
      content:   content.into(),
      timestamp: Utc::now(),
      editing:   false,
    }
  }

  /// Case-insensitive substring match. `needle` must already be lowercase.
  pub fn matches(&self, needle: &str) -> bool {
    self.content.to_lowercase().contains(needle)
  }
}

/// Body of `POST /api/messages/store-message`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
  pub conversation_id: String,
  pub doc_id:          String,
  pub role:            Role,
  pub content:         String,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub ts:              DateTime<Utc>,
}

impl MessageRecord {
  pub fn new(conversation_id: &str, doc_id: &str, message: &ChatMessage) -> Self {
    Self {
      conversation_id: conversation_id.to_owned(),
      doc_id:          doc_id.to_owned(),
      role:            message.role,
      content:         message.content.clone(),
      ts:              message.timestamp,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn history_deserialises_without_editing_flag() {
    let raw = r#"[{"id":"m1","role":"assistant","content":"Hi","ts":1700000000000}]"#;
    let msgs: Vec<ChatMessage> = serde_json::from_str(raw).unwrap();
    assert_eq!(msgs[0].role, Role::Assistant);
    assert_eq!(msgs[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    assert!(!msgs[0].editing);
  }

  #[test]
  fn editing_flag_never_serialised() {
    let mut m = ChatMessage::local(Role::User, "hello");
    m.editing = true;
    let v = serde_json::to_value(&m).unwrap();
    assert!(v.get("editing").is_none());
    assert!(v.get("ts").unwrap().is_i64());
  }

  #[test]
  fn record_uses_camel_case() {
    let m = ChatMessage::local(Role::User, "q?");
    let v = serde_json::to_value(MessageRecord::new("u1", "d1", &m)).unwrap();
    assert_eq!(v["conversationId"], "u1");
    assert_eq!(v["docId"], "d1");
    assert_eq!(v["role"], "user");
  }

  #[test]
  fn matches_ignores_case() {
    let m = ChatMessage::local(Role::User, "What is the Revenue?");
    assert!(m.matches("revenue"));
    assert!(!m.matches("profit"));
  }
}
