//! Client-side session handling and view controllers for docchat.
//!
//! Wiring, done once at process start:
//!
//! ```rust,ignore
//! let (state, session) = session::channel();
//! let api = ApiClient::new(&config, session.clone())?;
//! let sessions = SessionManager::new(store, api.clone(), state);
//! sessions.initialize().await;
//! let guard = RouteGuard::new(sessions.subscribe());
//! let chat = ChatController::new(api, sessions.subscribe());
//! ```
//!
//! The session is the only state shared between views. It lives behind a
//! `tokio::sync::watch` channel: the [`SessionManager`] holds the sender,
//! everything else holds receivers and reads the current value when it
//! needs it.

pub mod config;
pub mod controller;
pub mod debounce;
pub mod guard;
pub mod http;
pub mod notify;
pub mod session;

#[cfg(test)]
mod fake;

pub use config::ClientConfig;
pub use controller::ChatController;
pub use guard::{GuardOutcome, Navigator, Route, RouteGuard};
pub use http::ApiClient;
pub use session::SessionManager;
