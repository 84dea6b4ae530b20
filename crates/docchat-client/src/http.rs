//! Async HTTP client wrapping the docchat REST API.
//!
//! The only place where session state becomes a wire-level credential: the
//! bearer token is read from the session channel on every call, never
//! cached at construction.

use std::time::Duration;

use bytes::Bytes;
use docchat_core::{
  Error, Result,
  backend::{Answer, AuthApi, AuthGrant, Backend, OtpOutcome},
  document::{DocumentDescriptor, PdfFile, UploadProgress, UploadReceipt},
  message::{ChatMessage, MessageRecord},
  session::{ConversationKey, Session, User},
};
use reqwest::{
  Client, RequestBuilder, Response,
  multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::watch;

use crate::config::ClientConfig;

/// Question/answer calls wait this long for the model.
const ASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Granularity of upload progress reporting.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Async HTTP client for the docchat backend.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based and the
/// session receiver is a shared handle.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
  session:  watch::Receiver<Session>,
}

impl ApiClient {
  pub fn new(config: &ClientConfig, session: watch::Receiver<Session>) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.request_timeout())
      .build()
      .map_err(|e| Error::Transport(Box::new(e)))?;
    Ok(Self {
      client,
      base_url: config.backend_url.trim_end_matches('/').to_owned(),
      session,
    })
  }

  pub fn base_url(&self) -> &str { &self.base_url }

  fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

  /// Attach `Authorization: Bearer <token>` if a session exists right now.
  /// Attach the bearer token, if there is a non-empty one.
  fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
    let token = self.session.borrow().token().filter(|t| !t.is_empty()).cloned();
    match token {
      Some(token) => req.bearer_auth(token.as_str()),
      None => req,
    }
  }

  /// Send `req` and turn transport failures and non-2xx statuses into
  /// [`Error`]s. `fallback` is the message used when the backend gave none.
  async fn send(
    &self,
    req: RequestBuilder,
    what: &str,
    fallback: Option<&str>,
  ) -> Result<Response> {
    tracing::debug!("{what}");
    let resp = self
      .authorize(req)
      .send()
      .await
      .map_err(|e| Error::Transport(Box::new(e)))?;

    if resp.status().is_success() {
      Ok(resp)
    } else {
      Err(rejection(resp, fallback).await)
    }
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
    what: &str,
    fallback: Option<&str>,
  ) -> Result<T> {
    let resp = self.send(req, what, fallback).await?;
    resp
      .json()
      .await
      .map_err(|e| Error::Decode(format!("{what}: {e}")))
  }
}

/// Build an [`Error::Rejected`] from an error response, preferring the
/// backend's own `detail`, `error` or `message` field.
async fn rejection(resp: Response, fallback: Option<&str>) -> Error {
  let status = resp.status().as_u16();
  let body: Option<serde_json::Value> = resp.json().await.ok();
  let reported = body.as_ref().and_then(|b| {
    ["detail", "error", "message"]
      .iter()
      .find_map(|k| b.get(k).and_then(|v| v.as_str()))
      .filter(|m| !m.is_empty())
      .map(str::to_owned)
  });
  let message = reported
    .or_else(|| fallback.map(str::to_owned))
    .unwrap_or_else(|| format!("Request failed with status code {status}"));
  Error::Rejected { status, message }
}

// ── Auth ──────────────────────────────────────────────────────────────────

impl AuthApi for ApiClient {
  /// `POST /login`
  async fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
    let req = self
      .client
      .post(self.url("/login"))
      .json(&json!({ "email": email, "password": password }));
    self.send_json(req, "POST /login", Some("Login failed")).await
  }

  /// `POST /signup-user`
  async fn signup(&self, name: &str, email: &str, password: &str) -> Result<AuthGrant> {
    let req = self
      .client
      .post(self.url("/signup-user"))
      .json(&json!({ "name": name, "email": email, "password": password }));
    self.send_json(req, "POST /signup-user", Some("Signup failed")).await
  }

  /// `POST /auth/otp-validate`
  async fn validate_otp(&self, otp: &str, user: &User) -> Result<OtpOutcome> {
    let req = self
      .client
      .post(self.url("/auth/otp-validate"))
      .json(&json!({ "otp": otp, "user": user }));
    self
      .send_json(req, "POST /auth/otp-validate", Some("OTP verification failed"))
      .await
  }
}

// ── Documents & messages ──────────────────────────────────────────────────

impl Backend for ApiClient {
  /// `GET /documents`
  async fn list_documents(&self) -> Result<Vec<DocumentDescriptor>> {
    let req = self.client.get(self.url("/documents"));
    self.send_json(req, "GET /documents", None).await
  }

  /// `POST /upload` — multipart, field `file`.
  async fn upload_document(
    &self,
    file: PdfFile,
    progress: UploadProgress,
  ) -> Result<UploadReceipt> {
    let data = Bytes::from(file.content);
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
      .step_by(UPLOAD_CHUNK)
      .map(|start| data.slice(start..(start + UPLOAD_CHUNK).min(data.len())))
      .collect();

    let mut sent = 0u64;
    let body = futures::stream::iter(chunks.into_iter().map(move |chunk| {
      sent += chunk.len() as u64;
      progress.record(sent, total);
      Ok::<_, std::io::Error>(chunk)
    }));

    let part = Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
      .file_name(file.name)
      .mime_str("application/pdf")
      .map_err(|e| Error::Transport(Box::new(e)))?;

    let req = self
      .client
      .post(self.url("/upload"))
      .multipart(Form::new().part("file", part));
    self.send_json(req, "POST /upload", None).await
  }

  /// `DELETE /documents/:id`
  async fn delete_document(&self, id: &str) -> Result<()> {
    let req = self.client.delete(self.url(&format!("/documents/{id}")));
    self.send(req, "DELETE /documents/:id", None).await?;
    Ok(())
  }

  /// `GET /messages/:conversationId/:docId`
  async fn fetch_messages(&self, key: &ConversationKey) -> Result<Vec<ChatMessage>> {
    let req = self
      .client
      .get(self.url(&format!("/messages/{}/{}", key.owner, key.doc_id)));
    self.send_json(req, "GET /messages/:conversationId/:docId", None).await
  }

  /// `POST /ask`
  async fn ask(&self, doc_id: &str, question: &str) -> Result<Answer> {
    let req = self
      .client
      .post(self.url("/ask"))
      .timeout(ASK_TIMEOUT)
      .json(&json!({ "question": question, "docId": doc_id }));
    self.send_json(req, "POST /ask", None).await
  }

  /// `POST /api/messages/store-message`
  async fn store_message(&self, record: &MessageRecord) -> Result<()> {
    let req = self
      .client
      .post(self.url("/api/messages/store-message"))
      .json(record);
    self.send(req, "POST /api/messages/store-message", None).await?;
    Ok(())
  }

  /// `PATCH /messages/:id`
  async fn edit_message(&self, id: &str, content: &str) -> Result<()> {
    let req = self
      .client
      .patch(self.url(&format!("/messages/{id}")))
      .json(&json!({ "content": content }));
    self.send(req, "PATCH /messages/:id", None).await?;
    Ok(())
  }

  /// `DELETE /messages/:id`
  async fn delete_message(&self, id: &str) -> Result<()> {
    let req = self.client.delete(self.url(&format!("/messages/{id}")));
    self.send(req, "DELETE /messages/:id", None).await?;
    Ok(())
  }
}
