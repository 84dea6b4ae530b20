//! The document/chat data controller: owns the document cache, the
//! selected conversation and its messages, and mirrors local changes to the
//! backend.
//!
//! Two rules shape everything here:
//!
//! - A history response is only applied if the conversation key it was
//!   requested for is still current, and it is the newest request made.
//! - Message edits, deletions and stores are *optimistic*: the local list
//!   changes first, the backend call is fired without waiting, and a failed
//!   call is reported but never rolled back (see [`Optimistic`]).

use std::{
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use docchat_core::{
  Error,
  backend::Backend,
  document::{DocumentDescriptor, PdfFile, UploadProgress},
  message::{ChatMessage, MessageRecord, Role},
  session::{ConversationKey, Session},
};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
  debounce::{Debounced, SEARCH_DEBOUNCE},
  notify::Notification,
};

/// Shown instead of asking when no document is selected.
pub const NO_DOCUMENT_NOTICE: &str =
  "Please select a PDF or upload one before asking a question.";

/// Assistant text when the backend answered without an answer.
pub const NO_ANSWER: &str = "No answer received";

// ─── Optimistic mirroring ────────────────────────────────────────────────────

/// Fire-and-forget backend calls that mirror a change already applied
/// locally. Failures are logged and reported; the local change stands.
#[derive(Default)]
struct Optimistic {
  tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Optimistic {
  fn fire<F, R>(&self, what: &'static str, call: F, on_failure: R)
  where
    F: Future<Output = docchat_core::Result<()>> + Send + 'static,
    R: FnOnce(Error) + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      if let Err(e) = call.await {
        tracing::warn!(error = %e, "{what} failed; keeping local change");
        on_failure(e);
      }
    });
    let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
    tasks.retain(|t| !t.is_finished());
    tasks.push(handle);
  }

  /// Wait for every call fired so far, including ones fired while waiting.
  async fn settle(&self) {
    loop {
      let pending: Vec<_> = std::mem::take(
        &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
      );
      if pending.is_empty() {
        return;
      }
      for task in pending {
        if let Err(e) = task.await {
          tracing::error!(error = %e, "mirroring task panicked");
        }
      }
    }
  }
}

// ─── View state ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct ViewState {
  documents:         Vec<DocumentDescriptor>,
  documents_loading: bool,
  selected:          Option<String>,
  messages:          Vec<ChatMessage>,
  loading:           bool,
  /// Bumped on every history request; only the newest may apply.
  fetch_generation:  u64,
  notifications:     Vec<Notification>,
  /// Owner the current message list belongs to.
  owner:             Option<String>,
}

impl ViewState {
  fn notify(&mut self, notification: Notification) {
    self.notifications.push(notification);
  }
}

/// Snapshot written by `/export`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExport {
  pub conversation_id: String,
  pub document:        Option<DocumentDescriptor>,
  pub messages:        Vec<ChatMessage>,
  pub exported_at:     DateTime<Utc>,
}

impl ChatExport {
  /// `chat-export-YYYY-MM-DD.json`
  pub fn file_name(&self) -> String {
    format!("chat-export-{}.json", self.exported_at.format("%Y-%m-%d"))
  }
}

// ─── Controller ──────────────────────────────────────────────────────────────

struct Inner<B> {
  backend:  B,
  session:  watch::Receiver<Session>,
  state:    Mutex<ViewState>,
  search:   Debounced<String>,
  progress: UploadProgress,
  mirror:   Optimistic,
}

/// Chat view controller. Cheap to clone; clones drive the same view.
pub struct ChatController<B> {
  inner: Arc<Inner<B>>,
}

impl<B> Clone for ChatController<B> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<B> ChatController<B>
where
  B: Backend + Clone + 'static,
{
  pub fn new(backend: B, session: watch::Receiver<Session>) -> Self {
    Self {
      inner: Arc::new(Inner {
        backend,
        session,
        state: Mutex::new(ViewState::default()),
        search: Debounced::new(String::new(), SEARCH_DEBOUNCE),
        progress: UploadProgress::new(),
        mirror: Optimistic::default(),
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, ViewState> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn session(&self) -> Session { self.inner.session.borrow().clone() }

  fn notify(&self, notification: Notification) { self.state().notify(notification); }

  // ── Documents ───────────────────────────────────────────────────────────

  /// Reload the document cache. Failures keep the old list and notify.
  pub async fn refresh_documents(&self) {
    self.state().documents_loading = true;
    let result = self.inner.backend.list_documents().await;

    let mut st = self.state();
    st.documents_loading = false;
    match result {
      Ok(docs) => st.documents = docs,
      Err(e) => {
        tracing::warn!(error = %e, "listing documents failed");
        st.notify(Notification::error("Failed to fetch documents", e.to_string()));
      }
    }
  }

  /// Change the selected document and load its history. `None` clears
  /// the conversation.
  pub async fn select_document(&self, doc_id: Option<String>) {
    let generation = {
      let mut st = self.state();
      st.selected = doc_id.clone();
      st.messages.clear();
      st.fetch_generation += 1;
      st.fetch_generation
    };
    if let Some(doc_id) = doc_id {
      self.fetch_history(doc_id, generation).await;
    }
  }

  async fn fetch_history(&self, doc_id: String, generation: u64) {
    let session = self.session();
    let key = ConversationKey::new(&session, doc_id);
    let result = self.inner.backend.fetch_messages(&key).await;

    let mut st = self.state();
    // Superseded by a newer selection or a session change.
    let current_owner = self.inner.session.borrow().conversation_owner().to_owned();
    if st.fetch_generation != generation
      || st.selected.as_deref() != Some(key.doc_id.as_str())
      || current_owner != key.owner
    {
      tracing::debug!(doc = %key.doc_id, "discarding stale history");
      return;
    }
    st.owner = Some(key.owner);
    match result {
      Ok(messages) => st.messages = messages,
      Err(e) => {
        tracing::warn!(error = %e, "loading history failed");
        st.notify(Notification::error("Error", e.to_string()));
      }
    }
  }

  /// Re-derive the conversation after the session changed: if the owner of
  /// the loaded history is no longer the caller, reload it.
  pub async fn refresh_for_session(&self) {
    let owner = self.session().conversation_owner().to_owned();
    let (selected, generation) = {
      let mut st = self.state();
      if st.owner.as_deref() == Some(owner.as_str()) {
        return;
      }
      st.messages.clear();
      st.owner = None;
      st.fetch_generation += 1;
      (st.selected.clone(), st.fetch_generation)
    };
    if let Some(doc_id) = selected {
      self.fetch_history(doc_id, generation).await;
    }
  }

  /// Follow session changes for as long as the controller lives.
  pub fn follow_session(&self) -> JoinHandle<()> {
    let this = self.clone();
    let mut changes = self.inner.session.clone();
    tokio::spawn(async move {
      while changes.changed().await.is_ok() {
        this.refresh_for_session().await;
      }
    })
  }

  /// Upload a PDF, select it, and reload the list. `None` is a no-op.
  pub async fn upload_document(&self, file: Option<PdfFile>) {
    let Some(file) = file else { return };
    let name = file.name.clone();
    let progress = self.inner.progress.clone();
    progress.reset();

    let result = self.inner.backend.upload_document(file, progress.clone()).await;
    progress.reset();

    match result {
      Ok(receipt) => {
        tracing::info!(doc = %receipt.doc_id, "uploaded {name}");
        self.select_document(Some(receipt.doc_id.clone())).await;
        self.push_local(ChatMessage::local(
          Role::Assistant,
          format!("Uploaded PDF: {name} (docId: {})", receipt.doc_id),
        ));
        self.refresh_documents().await;
        self.notify(Notification::success(
          "Upload successful",
          format!("{name} has been uploaded"),
        ));
      }
      Err(e) => {
        tracing::warn!(error = %e, "upload of {name} failed");
        self.push_local(ChatMessage::local(Role::Assistant, format!("Upload failed: {e}")));
        self.notify(Notification::error("Upload failed", e.to_string()));
      }
    }
  }

  /// Remove a document now; the backend delete runs in the background.
  pub fn delete_document(&self, id: &str) {
    {
      let mut st = self.state();
      st.documents.retain(|d| d.id != id);
      if st.selected.as_deref() == Some(id) {
        st.selected = None;
        st.messages.clear();
        st.fetch_generation += 1;
      }
    }

    let this = self.clone();
    let id = id.to_owned();
    let handle = tokio::spawn(async move {
      match this.inner.backend.delete_document(&id).await {
        Ok(()) => {
          this.notify(Notification::success("Document deleted", format!("{id} was removed")));
          this.refresh_documents().await;
        }
        Err(e) => {
          tracing::warn!(error = %e, doc = %id, "delete failed");
          this.notify(Notification::error("Delete failed", e.to_string()));
        }
      }
    });
    self.track(handle);
  }

  fn track(&self, handle: JoinHandle<()>) {
    let mut tasks = self.inner.mirror.tasks.lock().unwrap_or_else(PoisonError::into_inner);
    tasks.retain(|t| !t.is_finished());
    tasks.push(handle);
  }

  // ── Messages ────────────────────────────────────────────────────────────

  fn push_local(&self, message: ChatMessage) { self.state().messages.push(message); }

  /// Append `message` and mirror it to the message store.
  fn push_and_store(&self, message: ChatMessage, doc_id: &str) {
    let record = MessageRecord::new(self.session().conversation_owner(), doc_id, &message);
    self.push_local(message);
    let backend = self.inner.backend.clone();
    self.inner.mirror.fire(
      "storing message",
      async move { backend.store_message(&record).await },
      |_| {},
    );
  }

  /// Ask a question about the selected document.
  /// Blank input is ignored; anything else is sent exactly as typed.
  pub async fn send(&self, content: &str) {
    if content.trim().is_empty() {
      return;
    }

    let selected = self.state().selected.clone();
    let Some(doc_id) = selected else {
      self.push_local(ChatMessage::local(Role::Assistant, NO_DOCUMENT_NOTICE));
      return;
    };

    self.push_and_store(ChatMessage::local(Role::User, content), &doc_id);
    self.state().loading = true;
    let result = self.inner.backend.ask(&doc_id, content).await;
    self.state().loading = false;

    match result {
      Ok(answer) => {
        let text = answer.answer.unwrap_or_else(|| NO_ANSWER.to_owned());
        self.push_and_store(ChatMessage::local(Role::Assistant, text), &doc_id);
      }
      Err(e) => {
        tracing::warn!(error = %e, "ask failed");
        self.push_local(ChatMessage::local(Role::Assistant, e.to_string()));
        self.notify(Notification::error("Error", e.to_string()));
      }
    }
  }

  /// Replace a message's content locally and mirror the edit.
  pub fn edit_message(&self, id: &str, content: &str) {
    {
      let mut st = self.state();
      let Some(msg) = st.messages.iter_mut().find(|m| m.id == id) else {
        return;
      };
      msg.content = content.to_owned();
      msg.editing = false;
    }

    let this = self.clone();
    let (id, content) = (id.to_owned(), content.to_owned());
    let backend = self.inner.backend.clone();
    self.inner.mirror.fire(
      "editing message",
      async move { backend.edit_message(&id, &content).await },
      move |e| this.notify(Notification::error("Error", e.to_string())),
    );
  }

  /// Drop a message locally and mirror the deletion.
  pub fn delete_message(&self, id: &str) {
    let removed = {
      let mut st = self.state();
      let before = st.messages.len();
      st.messages.retain(|m| m.id != id);
      st.messages.len() != before
    };
    if !removed {
      return;
    }

    let this = self.clone();
    let id = id.to_owned();
    let backend = self.inner.backend.clone();
    self.inner.mirror.fire(
      "deleting message",
      async move { backend.delete_message(&id).await },
      move |e| this.notify(Notification::error("Error", e.to_string())),
    );
  }

  pub fn set_editing(&self, id: &str, editing: bool) {
    if let Some(msg) = self.state().messages.iter_mut().find(|m| m.id == id) {
      msg.editing = editing;
    }
  }

  /// Local clear only; the stored history is untouched.
  pub fn clear_chat(&self) {
    let mut st = self.state();
    st.messages.clear();
    st.notify(Notification::info("Chat cleared", "All messages have been cleared"));
  }

  // ── Search ──────────────────────────────────────────────────────────────

  /// Set the search term; it takes effect after the debounce window.
  pub fn search(&self, term: impl Into<String>) -> JoinHandle<()> {
    self.inner.search.set(term.into())
  }

  /// The term currently applied to [`ChatController::visible_messages`].
  pub fn search_term(&self) -> String { self.inner.search.settled() }

  pub fn visible_messages(&self) -> Vec<ChatMessage> {
    let term = self.search_term();
    let st = self.state();
    if term.is_empty() {
      return st.messages.clone();
    }
    let needle = term.to_lowercase();
    st.messages.iter().filter(|m| m.matches(&needle)).cloned().collect()
  }

  // ── Export ──────────────────────────────────────────────────────────────

  pub fn export_chat(&self) -> ChatExport {
    let conversation_id = self.session().conversation_owner().to_owned();
    let mut st = self.state();
    let document = st
      .selected
      .as_ref()
      .and_then(|id| st.documents.iter().find(|d| &d.id == id))
      .cloned();
    let export = ChatExport {
      conversation_id,
      document,
      messages: st.messages.clone(),
      exported_at: Utc::now(),
    };
    st.notify(Notification::success(
      "Chat exported",
      format!("Saved as {}", export.file_name()),
    ));
    export
  }

  // ── Accessors ───────────────────────────────────────────────────────────

  pub fn messages(&self) -> Vec<ChatMessage> { self.state().messages.clone() }

  pub fn documents(&self) -> Vec<DocumentDescriptor> { self.state().documents.clone() }

  pub fn selected_document(&self) -> Option<String> { self.state().selected.clone() }

  pub fn is_loading(&self) -> bool { self.state().loading }

  pub fn documents_loading(&self) -> bool { self.state().documents_loading }

  pub fn upload_progress(&self) -> u8 { self.inner.progress.percent() }

  pub fn take_notifications(&self) -> Vec<Notification> {
    std::mem::take(&mut self.state().notifications)
  }

  /// Wait for all background backend calls fired so far.
  pub async fn settle(&self) { self.inner.mirror.settle().await }
}
