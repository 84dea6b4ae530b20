//! Transient notifications ("toasts") raised by controllers and drained by
//! whatever front-end renders them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
  Success,
  Info,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub level:       Level,
  pub title:       String,
  pub description: String,
}

impl Notification {
  pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { level: Level::Success, title: title.into(), description: description.into() }
  }

  pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { level: Level::Info, title: title.into(), description: description.into() }
  }

  pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self { level: Level::Error, title: title.into(), description: description.into() }
  }
}
