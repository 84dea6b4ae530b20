//! Route gating on session state.

use docchat_core::session::Session;
use tokio::sync::watch;

// ─── Routes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
  Home,
  Chat,
  Login,
  Signup,
  OtpVerification,
}

impl Route {
  pub const ALL: [Route; 5] =
    [Route::Home, Route::Chat, Route::Login, Route::Signup, Route::OtpVerification];

  pub fn path(self) -> &'static str {
    match self {
      Route::Home => "/",
      Route::Chat => "/chat",
      Route::Login => "/login",
      Route::Signup => "/signup",
      Route::OtpVerification => "/otp-verification",
    }
  }

  pub fn from_path(path: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|r| r.path() == path)
  }

  /// Only the chat view needs a session.
  pub fn is_protected(self) -> bool { matches!(self, Route::Chat) }
}

impl std::fmt::Display for Route {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.path())
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
  /// Session not resolved yet; show a loading state, decide nothing.
  Loading,
  Admit,
  /// Send the user elsewhere. `replace` means the guarded route must not
  /// stay in history.
  Redirect { to: Route, replace: bool },
}

/// The pure guard decision for a protected route.
pub fn guard(session: &Session) -> GuardOutcome {
  match session {
    Session::Initializing => GuardOutcome::Loading,
    Session::Authenticated { .. } => GuardOutcome::Admit,
    Session::Anonymous => GuardOutcome::Redirect { to: Route::Login, replace: true },
  }
}

/// Reads the session channel to gate navigation.
#[derive(Clone)]
pub struct RouteGuard {
  session: watch::Receiver<Session>,
}

impl RouteGuard {
  pub fn new(session: watch::Receiver<Session>) -> Self { Self { session } }

  /// Decide against the session as it is right now. Unprotected routes are
  /// always admitted.
  pub fn check(&self, route: Route) -> GuardOutcome {
    if !route.is_protected() {
      return GuardOutcome::Admit;
    }
    guard(&self.session.borrow())
  }

  /// Like [`RouteGuard::check`] but waits out `Initializing` first, so it
  /// never returns [`GuardOutcome::Loading`].
  pub async fn resolve(&self, route: Route) -> GuardOutcome {
    if !route.is_protected() {
      return GuardOutcome::Admit;
    }
    let mut session = self.session.clone();
    match session.wait_for(Session::is_resolved).await {
      Ok(current) => guard(&current),
      // The manager is gone; nobody can ever log in.
      Err(_) => GuardOutcome::Redirect { to: Route::Login, replace: true },
    }
  }
}

// ─── Navigation history ──────────────────────────────────────────────────────

/// A history stack that consults the guard on every navigation.
pub struct Navigator {
  guard:   RouteGuard,
  history: Vec<Route>,
}

impl Navigator {
  pub fn new(guard: RouteGuard) -> Self {
    Self { guard, history: vec![Route::Home] }
  }

  pub fn current(&self) -> Route {
    self.history.last().copied().unwrap_or(Route::Home)
  }

  pub fn history(&self) -> &[Route] { &self.history }

  fn apply(&mut self, outcome: GuardOutcome, route: Route) -> GuardOutcome {
    match outcome {
      GuardOutcome::Admit => self.history.push(route),
      GuardOutcome::Redirect { to, replace: true } => {
        // The guarded route never made it onto the stack; the redirect
        // takes the slot it would have had.
        self.history.push(to);
      }
      GuardOutcome::Redirect { to, replace: false } => {
        self.history.push(route);
        self.history.push(to);
      }
      GuardOutcome::Loading => {}
    }
    outcome
  }

  /// Navigate using the current session. `Loading` leaves history alone.
  pub fn navigate(&mut self, route: Route) -> GuardOutcome {
    let outcome = self.guard.check(route);
    self.apply(outcome, route)
  }

  /// Navigate once the session has resolved.
  pub async fn navigate_resolved(&mut self, route: Route) -> GuardOutcome {
    let outcome = self.guard.resolve(route).await;
    self.apply(outcome, route)
  }

  /// Pop one entry. The first entry is never popped.
  pub fn back(&mut self) -> Route {
    if self.history.len() > 1 {
      self.history.pop();
    }
    self.current()
  }
}
