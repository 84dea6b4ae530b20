//! Sign-up form checks performed before the backend is contacted.

use crate::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
  pub name:             String,
  pub email:            String,
  pub password:         String,
  pub confirm_password: String,
}

impl SignupForm {
  /// Checks run in order; the first failure wins.
  pub fn validate(&self) -> Result<()> {
    if self.email.is_empty() || self.password.is_empty() || self.confirm_password.is_empty() {
      return Err(Error::InvalidForm("All fields are required".into()));
    }
    if self.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::InvalidForm(format!(
        "Password must be at least {MIN_PASSWORD_LEN} characters"
      )));
    }
    if self.password != self.confirm_password {
      return Err(Error::InvalidForm("Passwords do not match".into()));
    }
    Ok(())
  }
}

/// Password strength as a percentage in steps of 25.
///
/// One point each for: longer than five characters, an ASCII uppercase
/// letter, an ASCII digit, a character outside `[A-Za-z0-9]`.
pub fn password_strength(password: &str) -> u8 {
  let checks = [
    password.chars().count() > 5,
    password.chars().any(|c| c.is_ascii_uppercase()),
    password.chars().any(|c| c.is_ascii_digit()),
    password.chars().any(|c| !c.is_ascii_alphanumeric()),
  ];
  let score = checks.iter().filter(|&&ok| ok).count() as u8;
  score * 25
}
