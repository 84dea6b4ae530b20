//! Wiring and the one-shot commands.

use std::{path::Path, time::Duration};

use anyhow::{Context as _, bail};
use docchat_client::{
  ApiClient, ChatController, ClientConfig, GuardOutcome, Navigator, Route, RouteGuard,
  SessionManager,
  notify::{Level, Notification},
  session,
};
use docchat_core::{
  document::{DocumentDescriptor, PdfFile},
  message::ChatMessage,
  session::Session,
  signup::{SignupForm, password_strength},
};
use docchat_store_sqlite::SqliteSessionStore;
use tokio::sync::Mutex;

use crate::prompt::Prompt;

pub type Chat = ChatController<ApiClient>;

/// Everything a command needs, built once per process.
pub struct App {
  sessions:   SessionManager<SqliteSessionStore, ApiClient>,
  guard:      RouteGuard,
  pub chat:   Chat,
  pub prompt: Mutex<Prompt>,
}

impl App {
  /// Open the session store, wire the client together and restore any
  /// stored session.
  pub async fn start(config: &ClientConfig, session_db: &Path) -> anyhow::Result<Self> {
    if let Some(dir) = session_db.parent() {
      tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let store = SqliteSessionStore::open(session_db)
      .await
      .with_context(|| format!("failed to open session store at {session_db:?}"))?;

    let (state, session) = session::channel();
    let api = ApiClient::new(config, session).context("failed to build HTTP client")?;
    let sessions = SessionManager::new(store, api.clone(), state);
    let status = sessions.initialize().await;
    tracing::debug!("using backend {} ({status})", api.base_url());

    let guard = RouteGuard::new(sessions.subscribe());
    let chat = ChatController::new(api, sessions.subscribe());
    chat.follow_session();

    Ok(Self { sessions, guard, chat, prompt: Mutex::new(Prompt::stdin()) })
  }

  /// Pass the chat route's guard, signing in first when redirected.
  async fn require_session(&self) -> anyhow::Result<()> {
    let mut nav = Navigator::new(self.guard.clone());
    match nav.navigate_resolved(Route::Chat).await {
      GuardOutcome::Admit => Ok(()),
      GuardOutcome::Redirect { to, .. } => {
        eprintln!("Not signed in; continuing at {to}");
        self.login(None, None).await?;
        match nav.navigate(Route::Chat) {
          GuardOutcome::Admit => Ok(()),
          _ => bail!("still not signed in"),
        }
      }
      GuardOutcome::Loading => bail!("session is still loading"),
    }
  }

  // ── Account ─────────────────────────────────────────────────────────────

  pub async fn login(
    &self,
    email: Option<String>,
    password: Option<String>,
  ) -> anyhow::Result<()> {
    let (email, password) = {
      let mut prompt = self.prompt.lock().await;
      let email = match email {
        Some(e) => e,
        None => prompt.required("Email: ").await?,
      };
      let password = match password {
        Some(p) => p,
        None => prompt.required("Password: ").await?,
      };
      (email, password)
    };

    let user = self.sessions.login(&email, &password).await.context("login failed")?;
    println!("Signed in as {}", user.email);
    Ok(())
  }

  pub async fn signup(&self) -> anyhow::Result<()> {
    let form = {
      let mut prompt = self.prompt.lock().await;
      SignupForm {
        name:             prompt.required("Name: ").await?,
        email:            prompt.required("Email: ").await?,
        password:         prompt.required("Password: ").await?,
        confirm_password: prompt.required("Confirm password: ").await?,
      }
    };
    form.validate()?;
    println!("Password strength: {}%", password_strength(&form.password));

    let user = self
      .sessions
      .signup(&form.name, &form.email, &form.password)
      .await
      .context("signup failed")?;
    println!("Account created for {}; check your email for a code.", user.email);
    self.verify_otp(None).await
  }

  pub async fn verify_otp(&self, otp: Option<String>) -> anyhow::Result<()> {
    let otp = match otp {
      Some(otp) => otp,
      None => self.prompt.lock().await.required("One-time code: ").await?,
    };
    let user = self.sessions.verify_otp(otp.trim()).await.context("verification failed")?;
    println!("Verified {}", user.email);
    Ok(())
  }

  pub async fn logout(&self) {
    self.sessions.logout().await;
    println!("Signed out");
  }

  pub fn whoami(&self) {
    match self.sessions.current() {
      Session::Authenticated { user, .. } => match &user.name {
        Some(name) => println!("{name} <{}> ({})", user.email, user.id),
        None => println!("{} ({})", user.email, user.id),
      },
      _ => println!("Not signed in"),
    }
  }

  // ── Documents ───────────────────────────────────────────────────────────

  pub async fn docs(&self) -> anyhow::Result<()> {
    self.require_session().await?;
    self.chat.refresh_documents().await;
    self.report();
    print_documents(&self.chat.documents(), self.chat.selected_document().as_deref());
    Ok(())
  }

  pub async fn upload(&self, path: &Path) -> anyhow::Result<()> {
    self.require_session().await?;
    let file = read_pdf(path).await?;
    upload_with_progress(&self.chat, file).await;
    let notes = self.chat.take_notifications();
    print_notifications(&notes);
    if let Some(last) = self.chat.messages().last() {
      println!("{}", last.content);
    }
    ensure_succeeded(&notes, "upload")
  }

  pub async fn delete(&self, id: &str) -> anyhow::Result<()> {
    self.require_session().await?;
    self.chat.refresh_documents().await;
    if !self.chat.documents().iter().any(|d| d.id == id) {
      bail!("no document with id {id}");
    }
    self.chat.delete_document(id);
    self.chat.settle().await;
    let notes = self.chat.take_notifications();
    print_notifications(&notes);
    ensure_succeeded(&notes, "delete")
  }

  pub async fn chat(&self, doc: Option<String>) -> anyhow::Result<()> {
    self.require_session().await?;
    self.chat.refresh_documents().await;
    if doc.is_some() {
      self.chat.select_document(doc).await;
    }
    self.report();
    crate::repl::run(self).await
  }

  /// Print and drain pending notifications.
  pub fn report(&self) { print_notifications(&self.chat.take_notifications()); }

  pub async fn settle(&self) { self.chat.settle().await }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

pub async fn read_pdf(path: &Path) -> anyhow::Result<PdfFile> {
  let is_pdf = path
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
  if !is_pdf {
    bail!("{} is not a PDF", path.display());
  }
  let content = tokio::fs::read(path)
    .await
    .with_context(|| format!("failed to read {}", path.display()))?;
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "upload.pdf".to_owned());
  Ok(PdfFile { name, content })
}

/// Run an upload while echoing its progress on stderr.
pub async fn upload_with_progress(chat: &Chat, file: PdfFile) {
  let upload = chat.upload_document(Some(file));
  tokio::pin!(upload);
  let mut tick = tokio::time::interval(Duration::from_millis(200));
  loop {
    tokio::select! {
      () = &mut upload => break,
      _ = tick.tick() => {
        let pct = chat.upload_progress();
        if pct > 0 {
          eprint!("\ruploading… {pct:>3}%");
        }
      }
    }
  }
  eprint!("\r");
}

/// Fail a one-shot command whose work raised an error notification.
fn ensure_succeeded(notes: &[Notification], what: &str) -> anyhow::Result<()> {
  match notes.iter().find(|n| n.level == Level::Error) {
    Some(note) => bail!("{what} failed: {}", note.description),
    None => Ok(()),
  }
}

pub fn print_notifications(notes: &[Notification]) {
  for note in notes {
    eprintln!("[{}] {}: {}", note.level, note.title, note.description);
  }
}

pub fn print_documents(docs: &[DocumentDescriptor], selected: Option<&str>) {
  if docs.is_empty() {
    println!("No documents uploaded yet.");
    return;
  }
  for doc in docs {
    let marker = if selected == Some(doc.id.as_str()) { '*' } else { ' ' };
    let uploaded = doc
      .uploaded_at
      .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_default();
    println!(
      "{marker} {:<24} {:<32} {:<10} {:>10}  {uploaded}",
      doc.id,
      doc.original_name,
      doc.status,
      doc.display_size(),
    );
  }
}

pub fn print_messages(messages: &[ChatMessage]) {
  for (i, msg) in messages.iter().enumerate() {
    let time = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    let editing = if msg.editing { " (editing)" } else { "" };
    println!("{:>3} {time} {}{editing}: {}", i + 1, msg.role, msg.content);
  }
}
