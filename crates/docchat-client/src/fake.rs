//! In-memory collaborators for unit tests.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
  time::Duration,
};

use docchat_core::{
  Error, Result,
  backend::{Answer, AuthApi, AuthGrant, Backend, OtpOutcome},
  document::{DocumentDescriptor, DocumentStatus, PdfFile, UploadProgress, UploadReceipt},
  message::{ChatMessage, MessageRecord},
  session::{ConversationKey, Credential, User},
  store::{SessionStore, StoredSession},
};

// ─── Backend ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
  calls:       Vec<String>,
  documents:   Vec<DocumentDescriptor>,
  histories:   HashMap<String, Vec<ChatMessage>>,
  fetch_delay: HashMap<String, Duration>,
  ask_delay:   Duration,
  failing:     HashSet<&'static str>,
  answer:      Option<String>,
  stored:      Vec<MessageRecord>,
}

/// A scriptable backend. Cheap to clone; clones share state, so a test can
/// keep one handle while the code under test owns another.
#[derive(Clone, Default)]
pub struct FakeBackend(Arc<Mutex<State>>);

impl FakeBackend {
  fn state(&self) -> std::sync::MutexGuard<'_, State> { self.0.lock().unwrap() }

  /// Record a call and decide whether it should fail.
  fn enter(&self, op: &'static str, detail: &str) -> Result<()> {
    let mut st = self.state();
    st.calls.push(format!("{op} {detail}").trim_end().to_owned());
    if st.failing.contains(op) {
      return Err(Error::Rejected { status: 500, message: format!("{op} exploded") });
    }
    Ok(())
  }

  pub fn calls(&self) -> Vec<String> { self.state().calls.clone() }

  pub fn calls_to(&self, op: &str) -> usize {
    self.state().calls.iter().filter(|c| c.split(' ').next() == Some(op)).count()
  }

  pub fn fail(&self, op: &'static str) { self.state().failing.insert(op); }

  pub fn add_document(&self, id: &str) {
    self.state().documents.push(document(id));
  }

  pub fn documents(&self) -> Vec<DocumentDescriptor> { self.state().documents.clone() }

  pub fn set_history(&self, doc_id: &str, messages: Vec<ChatMessage>) {
    self.state().histories.insert(doc_id.to_owned(), messages);
  }

  pub fn delay_fetch(&self, doc_id: &str, delay: Duration) {
    self.state().fetch_delay.insert(doc_id.to_owned(), delay);
  }

  pub fn delay_ask(&self, delay: Duration) { self.state().ask_delay = delay; }

  pub fn set_answer(&self, answer: Option<&str>) {
    self.state().answer = answer.map(str::to_owned);
  }

  pub fn stored(&self) -> Vec<MessageRecord> { self.state().stored.clone() }
}

pub fn document(id: &str) -> DocumentDescriptor {
  DocumentDescriptor {
    id:            id.to_owned(),
    original_name: format!("{id}.pdf"),
    stored_name:   format!("stored-{id}.pdf"),
    status:        DocumentStatus::Ready,
    size:          1024,
    uploaded_at:   None,
  }
}

impl AuthApi for FakeBackend {
  async fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
    self.enter("login", email)?;
    let token = match password {
      "secret" => format!("token-for-{email}"),
      // A backend that answers 200 without a usable credential.
      "empty-token" => String::new(),
      _ => {
        return Err(Error::Rejected { status: 401, message: "Invalid credentials".into() });
      }
    };
    Ok(AuthGrant {
      token: Credential::new(token),
      user:  User { id: "u-1".into(), email: email.to_owned(), name: None },
    })
  }

  async fn signup(&self, name: &str, email: &str, _password: &str) -> Result<AuthGrant> {
    self.enter("signup", email)?;
    if email.starts_with("taken@") {
      return Err(Error::Rejected { status: 409, message: "Email already registered".into() });
    }
    Ok(AuthGrant {
      token: Credential::new("provisional-token"),
      user:  User { id: "u-new".into(), email: email.to_owned(), name: Some(name.to_owned()) },
    })
  }

  async fn validate_otp(&self, otp: &str, user: &User) -> Result<OtpOutcome> {
    self.enter("validate_otp", otp)?;
    if otp != "1234" {
      return Ok(OtpOutcome::default());
    }
    Ok(OtpOutcome {
      success: true,
      token:   Some(Credential::new("verified-token")),
      user:    Some(User { name: Some("Verified".into()), ..user.clone() }),
    })
  }
}

impl Backend for FakeBackend {
  async fn list_documents(&self) -> Result<Vec<DocumentDescriptor>> {
    self.enter("list_documents", "")?;
    Ok(self.documents())
  }

  async fn upload_document(&self, file: PdfFile, progress: UploadProgress) -> Result<UploadReceipt> {
    self.enter("upload_document", &file.name)?;
    let total = file.content.len() as u64;
    progress.record(total / 2, total);
    tokio::task::yield_now().await;
    progress.record(total, total);
    let id = format!("doc-{}", file.name.trim_end_matches(".pdf"));
    self.state().documents.push(document(&id));
    Ok(UploadReceipt { doc_id: id })
  }

  async fn delete_document(&self, id: &str) -> Result<()> {
    self.enter("delete_document", id)?;
    self.state().documents.retain(|d| d.id != id);
    Ok(())
  }

  async fn fetch_messages(&self, key: &ConversationKey) -> Result<Vec<ChatMessage>> {
    self.enter("fetch_messages", &format!("{}/{}", key.owner, key.doc_id))?;
    let delay = self.state().fetch_delay.get(&key.doc_id).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    Ok(self.state().histories.get(&key.doc_id).cloned().unwrap_or_default())
  }

  async fn ask(&self, doc_id: &str, question: &str) -> Result<Answer> {
    self.enter("ask", &format!("{doc_id} {question}"))?;
    let delay = self.state().ask_delay;
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    Ok(Answer { answer: self.state().answer.clone() })
  }

  async fn store_message(&self, record: &MessageRecord) -> Result<()> {
    self.enter("store_message", &record.content)?;
    self.state().stored.push(record.clone());
    Ok(())
  }

  async fn edit_message(&self, id: &str, content: &str) -> Result<()> {
    self.enter("edit_message", &format!("{id} {content}"))
  }

  async fn delete_message(&self, id: &str) -> Result<()> {
    self.enter("delete_message", id)
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A store whose disk is gone: loads nothing, refuses every write.
pub struct FailingStore;

impl SessionStore for FailingStore {
  type Error = std::io::Error;

  async fn load(&self) -> Option<StoredSession> { None }

  async fn save(&self, _: &User, _: &Credential) -> Result<(), Self::Error> {
    Err(std::io::Error::other("disk full"))
  }

  async fn clear(&self) -> Result<(), Self::Error> {
    Err(std::io::Error::other("disk full"))
  }
}
