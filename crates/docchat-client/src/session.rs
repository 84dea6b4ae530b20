//! The session state machine.
//!
//! ```text
//! Initializing ──initialize()──▶ Anonymous ◀──logout()── Authenticated
//!                     └────────▶ Authenticated ◀──login()/signup()/verify_otp()
//! ```
//!
//! Every transition publishes one complete [`Session`] value on the watch
//! channel, so subscribers never see a user without a token or a token
//! without a user.

use std::sync::atomic::{AtomicBool, Ordering};

use docchat_core::{
  Error, Result,
  backend::{AuthApi, AuthGrant},
  session::{Session, SessionStatus, User},
  store::SessionStore,
};
use tokio::sync::watch;

/// Create the session channel in its `Initializing` state.
///
/// The sender goes to [`SessionManager::new`]; receivers go to anything that
/// must read the session (the HTTP client needs one before the manager
/// exists, since the manager in turn needs the client).
pub fn channel() -> (watch::Sender<Session>, watch::Receiver<Session>) {
  watch::channel(Session::Initializing)
}

/// Owns the session for the lifetime of the process.
///
/// Construct once at startup and hand out receivers via
/// [`SessionManager::subscribe`]; consumers never write the session
/// directly.
pub struct SessionManager<S, A> {
  store:       S,
  auth:        A,
  state:       watch::Sender<Session>,
  initialized: AtomicBool,
}

impl<S, A> SessionManager<S, A>
where
  S: SessionStore,
  A: AuthApi,
{
  pub fn new(store: S, auth: A, state: watch::Sender<Session>) -> Self {
    Self { store, auth, state, initialized: AtomicBool::new(false) }
  }

  pub fn subscribe(&self) -> watch::Receiver<Session> { self.state.subscribe() }

  /// Snapshot of the current session.
  pub fn current(&self) -> Session { self.state.borrow().clone() }

  pub fn status(&self) -> SessionStatus { self.state.borrow().status() }

  // ── Startup ─────────────────────────────────────────────────────────────

  /// Restore the session from the store. Only the first call reads the
  /// store; later (or concurrent) calls wait for that one to settle.
  ///
  /// A sign-in that lands before the store answers is kept.
  pub async fn initialize(&self) -> SessionStatus {
    if self.initialized.swap(true, Ordering::AcqRel) {
      let mut rx = self.subscribe();
      // The sender lives in `self`, so the channel cannot close here.
      let _ = rx.wait_for(Session::is_resolved).await;
      return self.status();
    }

    let mut restored = self.store.load().await;
    self.state.send_if_modified(|session| {
      if session.is_resolved() {
        return false;
      }
      *session = match restored.take() {
        Some(stored) => Session::Authenticated { user: stored.user, token: stored.token },
        None => Session::Anonymous,
      };
      true
    });

    let status = self.status();
    tracing::debug!("session initialised: {status}");
    status
  }

  // ── Transitions ─────────────────────────────────────────────────────────

  /// Sign in. On failure the session is left exactly as it was.
  pub async fn login(&self, email: &str, password: &str) -> Result<User> {
    let grant = self.auth.login(email, password).await?;
    self.establish(grant).await
  }

  /// Create an account and sign in with the provisional identity it
  /// returns. Callers route to the OTP step next.
  pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User> {
    let grant = self.auth.signup(name, email, password).await?;
    self.establish(grant).await
  }

  /// Confirm the second factor for the signed-in identity and replace its
  /// token and profile with the verified ones.
  pub async fn verify_otp(&self, otp: &str) -> Result<User> {
    let user = self
      .state
      .borrow()
      .user()
      .cloned()
      .ok_or(Error::NoPendingIdentity)?;

    let outcome = self.auth.validate_otp(otp, &user).await?;
    if !outcome.success {
      return Err(Error::OtpRejected);
    }
    match (outcome.token, outcome.user) {
      (Some(token), Some(user)) => self.establish(AuthGrant { token, user }).await,
      _ => Err(Error::Decode("OTP confirmation lacks token or user".into())),
    }
  }

  /// Persist first, then publish. If persisting fails nothing changes.
  /// A grant without a usable token is refused before anything is written.
  async fn establish(&self, grant: AuthGrant) -> Result<User> {
    if grant.token.is_empty() {
      return Err(Error::Decode("credential grant carries an empty token".into()));
    }
    self
      .store
      .save(&grant.user, &grant.token)
      .await
      .map_err(|e| Error::Storage(Box::new(e)))?;

    let user = grant.user.clone();
    self.state.send_replace(Session::Authenticated {
      user:  grant.user,
      token: grant.token,
    });
    tracing::info!("signed in as {}", user.email);
    Ok(user)
  }

  /// Sign out. Idempotent and infallible: a store that cannot be cleared is
  /// logged and the in-memory session is reset regardless.
  ///
  /// The store is cleared before `Anonymous` is published, mirroring
  /// `establish`, so the in-memory session never outlives its stored copy.
  /// A login racing a logout is not ordered against it.
  pub async fn logout(&self) {
    if let Err(e) = self.store.clear().await {
      tracing::warn!("failed to clear stored session: {e}");
    }

    let changed = self.state.send_if_modified(|session| {
      if matches!(session, Session::Anonymous) {
        return false;
      }
      *session = Session::Anonymous;
      true
    });
    if changed {
      tracing::info!("signed out");
    }
  }

  /// Replace the signed-in user's profile, keeping token and status.
  /// Returns `false` (and changes nothing) when nobody is signed in.
  pub fn set_user(&self, user: User) -> bool {
    let mut user = Some(user);
    let replaced = self.state.send_if_modified(|session| match session {
      Session::Authenticated { user: current, .. } => {
        if let Some(u) = user.take() {
          *current = u;
        }
        true
      }
      _ => false,
    });
    if !replaced {
      tracing::warn!("set_user ignored: no signed-in session");
    }
    replaced
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use docchat_core::{session::Credential, store::StoredSession};
  use docchat_store_sqlite::SqliteSessionStore;

  use super::*;
  use crate::fake::{FailingStore, FakeBackend};

  async fn manager() -> SessionManager<SqliteSessionStore, FakeBackend> {
    let store = SqliteSessionStore::open_in_memory().await.unwrap();
    let (state, _) = channel();
    SessionManager::new(store, FakeBackend::default(), state)
  }

  fn alice() -> User {
    User { id: "u-1".into(), email: "a@b.com".into(), name: None }
  }

  // ── initialize ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn empty_store_resolves_anonymous() {
    let m = manager().await;
    assert_eq!(m.status(), SessionStatus::Initializing);
    assert_eq!(m.initialize().await, SessionStatus::Anonymous);
  }

  #[tokio::test]
  async fn stored_pair_resolves_authenticated() {
    let m = manager().await;
    m.store.save(&alice(), &Credential::new("tok")).await.unwrap();

    assert_eq!(m.initialize().await, SessionStatus::Authenticated);
    assert_eq!(m.current().user(), Some(&alice()));
    assert_eq!(m.current().token().map(Credential::as_str), Some("tok"));
  }

  #[tokio::test]
  async fn never_initializing_again_after_initialize() {
    let m = manager().await;
    let mut rx = m.subscribe();
    m.initialize().await;

    m.login("a@b.com", "secret").await.unwrap();
    m.logout().await;
    m.initialize().await;
    m.logout().await;

    assert!(rx.borrow_and_update().is_resolved());
    assert_ne!(m.status(), SessionStatus::Initializing);
  }

  #[tokio::test]
  async fn second_initialize_does_not_reread_store() {
    let m = manager().await;
    m.initialize().await;
    // Something written afterwards must not be picked up by a re-run.
    m.store.save(&alice(), &Credential::new("tok")).await.unwrap();
    assert_eq!(m.initialize().await, SessionStatus::Anonymous);
  }

  #[tokio::test]
  async fn concurrent_initialize_calls_agree() {
    let m = manager().await;
    m.store.save(&alice(), &Credential::new("tok")).await.unwrap();
    let (a, b) = tokio::join!(m.initialize(), m.initialize());
    assert_eq!(a, SessionStatus::Authenticated);
    assert_eq!(b, SessionStatus::Authenticated);
  }

  #[tokio::test]
  async fn login_before_initialize_is_not_overwritten() {
    let m = manager().await;
    m.login("a@b.com", "secret").await.unwrap();
    assert_eq!(m.initialize().await, SessionStatus::Authenticated);
  }

  // ── login / signup ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn login_persists_and_publishes_the_pair() {
    let m = manager().await;
    m.initialize().await;
    let mut rx = m.subscribe();

    let user = m.login("a@b.com", "secret").await.unwrap();
    assert_eq!(user.email, "a@b.com");

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.user(), Some(&user));
    assert!(seen.token().is_some());

    let stored = m.store.load().await.expect("persisted");
    assert_eq!(stored.user, user);
    assert_eq!(Some(&stored.token), seen.token());
  }

  #[tokio::test]
  async fn failed_login_changes_nothing() {
    let m = manager().await;
    m.initialize().await;
    let mut rx = m.subscribe();
    rx.borrow_and_update();

    let err = m.login("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(!rx.has_changed().unwrap());
    assert_eq!(m.current(), Session::Anonymous);
    assert!(m.store.load().await.is_none());
  }

  #[tokio::test]
  async fn grant_with_empty_token_is_refused() {
    let m = manager().await;
    m.initialize().await;
    let mut rx = m.subscribe();
    rx.borrow_and_update();

    let err = m.login("a@b.com", "empty-token").await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert!(!rx.has_changed().unwrap());
    assert_eq!(m.current(), Session::Anonymous);
    assert!(m.store.load().await.is_none());
  }

  #[tokio::test]
  async fn failed_login_keeps_an_existing_session() {
    let m = manager().await;
    m.initialize().await;
    m.login("a@b.com", "secret").await.unwrap();
    let before = m.current();

    assert!(m.login("a@b.com", "wrong").await.is_err());
    assert_eq!(m.current(), before);
  }

  #[tokio::test]
  async fn login_that_cannot_persist_changes_nothing() {
    let (state, _) = channel();
    let m = SessionManager::new(FailingStore, FakeBackend::default(), state);
    m.initialize().await;

    let err = m.login("a@b.com", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(m.current(), Session::Anonymous);
  }

  #[tokio::test]
  async fn signup_authenticates_with_provisional_identity() {
    let m = manager().await;
    m.initialize().await;
    let user = m.signup("Alice", "new@b.com", "secret").await.unwrap();
    assert_eq!(user.name.as_deref(), Some("Alice"));
    assert_eq!(m.status(), SessionStatus::Authenticated);
  }

  #[tokio::test]
  async fn signup_rejection_surfaces_backend_message() {
    let m = manager().await;
    m.initialize().await;
    let err = m.signup("Alice", "taken@b.com", "secret").await.unwrap_err();
    assert_eq!(err.to_string(), "Email already registered");
    assert_eq!(m.current(), Session::Anonymous);
  }

  // ── OTP ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn otp_upgrades_token_and_user_together() {
    let m = manager().await;
    m.initialize().await;
    m.signup("Alice", "new@b.com", "secret").await.unwrap();

    let verified = m.verify_otp("1234").await.unwrap();
    let now = m.current();
    assert_eq!(now.user(), Some(&verified));
    assert_eq!(now.token().map(Credential::as_str), Some("verified-token"));

    let stored = m.store.load().await.unwrap();
    assert_eq!(stored.token.as_str(), "verified-token");
  }

  #[tokio::test]
  async fn wrong_otp_is_rejected_without_change() {
    let m = manager().await;
    m.initialize().await;
    m.signup("Alice", "new@b.com", "secret").await.unwrap();
    let before = m.current();

    assert!(matches!(m.verify_otp("0000").await, Err(Error::OtpRejected)));
    assert_eq!(m.current(), before);
  }

  #[tokio::test]
  async fn otp_without_identity_is_refused() {
    let m = manager().await;
    m.initialize().await;
    assert!(matches!(m.verify_otp("1234").await, Err(Error::NoPendingIdentity)));
  }

  // ── logout / set_user ───────────────────────────────────────────────────

  #[tokio::test]
  async fn logout_twice_is_the_same_as_once() {
    let m = manager().await;
    m.initialize().await;
    m.login("a@b.com", "secret").await.unwrap();

    m.logout().await;
    let once = m.current();
    let mut rx = m.subscribe();
    rx.borrow_and_update();

    m.logout().await;
    assert_eq!(m.current(), once);
    assert_eq!(once, Session::Anonymous);
    assert!(once.user().is_none() && once.token().is_none());
    assert!(!rx.has_changed().unwrap());
    assert!(m.store.load().await.is_none());
  }

  #[tokio::test]
  async fn logout_survives_a_broken_store() {
    let (state, _) = channel();
    let m = SessionManager::new(FailingStore, FakeBackend::default(), state);
    m.initialize().await;
    m.logout().await;
    assert_eq!(m.current(), Session::Anonymous);
  }

  /// Records the published status each time `clear` runs.
  struct ObservingStore {
    session: watch::Receiver<Session>,
    seen:    Arc<Mutex<Vec<SessionStatus>>>,
  }

  impl SessionStore for ObservingStore {
    type Error = std::io::Error;

    async fn load(&self) -> Option<StoredSession> { None }

    async fn save(&self, _: &User, _: &Credential) -> Result<(), Self::Error> { Ok(()) }

    async fn clear(&self) -> Result<(), Self::Error> {
      let status = self.session.borrow().status();
      self.seen.lock().unwrap().push(status);
      Ok(())
    }
  }

  #[tokio::test]
  async fn logout_clears_store_before_publishing() {
    let (state, rx) = channel();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = ObservingStore { session: rx, seen: Arc::clone(&seen) };
    let m = SessionManager::new(store, FakeBackend::default(), state);
    m.initialize().await;
    m.login("a@b.com", "secret").await.unwrap();

    m.logout().await;
    assert_eq!(*seen.lock().unwrap(), [SessionStatus::Authenticated]);
    assert_eq!(m.current(), Session::Anonymous);
  }

  #[tokio::test]
  async fn set_user_keeps_token_and_status() {
    let m = manager().await;
    m.initialize().await;
    m.login("a@b.com", "secret").await.unwrap();
    let token = m.current().token().cloned();

    let renamed = User { name: Some("Al".into()), ..m.current().user().cloned().unwrap() };
    assert!(m.set_user(renamed.clone()));
    assert_eq!(m.current().user(), Some(&renamed));
    assert_eq!(m.current().token().cloned(), token);
  }

  #[tokio::test]
  async fn set_user_while_anonymous_is_ignored() {
    let m = manager().await;
    m.initialize().await;
    assert!(!m.set_user(alice()));
    assert_eq!(m.current(), Session::Anonymous);
  }
}
