//! Document descriptors and upload inputs.

use std::sync::{
  Arc,
  atomic::{AtomicU8, Ordering},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion status reported by the backend. Changes asynchronously
/// server-side; the client only sees it on a full list reload.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentStatus {
  #[default]
  Uploaded,
  Ingesting,
  Ready,
  Error,
}

/// Backend-reported metadata about an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
  pub id:            String,
  pub original_name: String,
  #[serde(default)]
  pub stored_name:   String,
  #[serde(default)]
  pub status:        DocumentStatus,
  /// Size in bytes.
  #[serde(default)]
  pub size:          u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uploaded_at:   Option<DateTime<Utc>>,
}

impl DocumentDescriptor {
  /// Size rendered the way the document table shows it, e.g. `"12.5 KB"`.
  pub fn display_size(&self) -> String {
    format!("{:.1} KB", self.size as f64 / 1024.0)
  }
}

/// Response body of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
  pub doc_id: String,
}

/// A PDF chosen for upload.
#[derive(Debug, Clone)]
pub struct PdfFile {
  pub name:    String,
  pub content: Vec<u8>,
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// Upload progress as a whole percentage, shared between the body stream
/// that advances it and the view that displays it.
///
/// Cheap to clone; all clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress(Arc<AtomicU8>);

impl UploadProgress {
  pub fn new() -> Self { Self::default() }

  /// Record `sent` of `total` bytes. A zero `total` is ignored, since no
  /// percentage can be derived from it.
  pub fn record(&self, sent: u64, total: u64) {
    if total == 0 {
      return;
    }
    let pct = (sent.min(total) as f64 * 100.0 / total as f64).round() as u8;
    self.0.store(pct, Ordering::Relaxed);
  }

  pub fn percent(&self) -> u8 { self.0.load(Ordering::Relaxed) }

  pub fn reset(&self) { self.0.store(0, Ordering::Relaxed); }

  /// Whether a transfer is visibly underway (strictly between 0 and 100).
  pub fn in_flight(&self) -> bool { matches!(self.percent(), 1..=99) }
}
