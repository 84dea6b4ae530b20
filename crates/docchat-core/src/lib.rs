//! Domain types for docchat: sessions, documents, chat messages, and the
//! traits the client crates implement against (`AuthApi`, `Backend`,
//! `SessionStore`).
//!
//! No HTTP or database code lives here.

pub mod backend;
pub mod document;
pub mod error;
pub mod message;
pub mod session;
pub mod signup;
pub mod store;

pub use error::{Error, Result};
