//! The remote collaborators the client talks to.
//!
//! [`AuthApi`] issues credentials; [`Backend`] owns documents, messages and
//! answering. Both are implemented over HTTP by `docchat-client`; tests
//! substitute in-memory fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  document::{DocumentDescriptor, PdfFile, UploadProgress, UploadReceipt},
  message::{ChatMessage, MessageRecord},
  session::{ConversationKey, Credential, User},
};

// ─── Auth payloads ───────────────────────────────────────────────────────────

/// Credentials issued by `/login` and `/signup-user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
  pub token: Credential,
  pub user:  User,
}

/// Response of `/auth/otp-validate`. Token and user are only meaningful
/// when `success` is true.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtpOutcome {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub token:   Option<Credential>,
  #[serde(default)]
  pub user:    Option<User>,
}

/// Response of `/ask`. The backend may omit the answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Answer {
  #[serde(default)]
  pub answer: Option<String>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Authentication collaborator consumed by the session state machine.
pub trait AuthApi: Send + Sync {
  /// `POST /login`
  fn login<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<AuthGrant>> + Send + 'a;

  /// `POST /signup-user`
  fn signup<'a>(
    &'a self,
    name: &'a str,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<AuthGrant>> + Send + 'a;

  /// `POST /auth/otp-validate`
  fn validate_otp<'a>(
    &'a self,
    otp: &'a str,
    user: &'a User,
  ) -> impl Future<Output = Result<OtpOutcome>> + Send + 'a;
}

/// Document, conversation and answering collaborator consumed by the chat
/// controller.
///
/// All methods return `Send` futures so calls can be moved onto spawned
/// tasks for fire-and-forget mirroring.
pub trait Backend: Send + Sync {
  // ── Documents ─────────────────────────────────────────────────────────

  fn list_documents(
    &self,
  ) -> impl Future<Output = Result<Vec<DocumentDescriptor>>> + Send + '_;

  /// Upload `file` as multipart form data, advancing `progress` as the body
  /// is sent.
  fn upload_document(
    &self,
    file: PdfFile,
    progress: UploadProgress,
  ) -> impl Future<Output = Result<UploadReceipt>> + Send + '_;

  fn delete_document<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  // ── Conversation ──────────────────────────────────────────────────────

  fn fetch_messages<'a>(
    &'a self,
    key: &'a ConversationKey,
  ) -> impl Future<Output = Result<Vec<ChatMessage>>> + Send + 'a;

  fn ask<'a>(
    &'a self,
    doc_id: &'a str,
    question: &'a str,
  ) -> impl Future<Output = Result<Answer>> + Send + 'a;

  fn store_message<'a>(
    &'a self,
    record: &'a MessageRecord,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn edit_message<'a>(
    &'a self,
    id: &'a str,
    content: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn delete_message<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}
