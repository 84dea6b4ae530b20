//! `docchat` — chat with your PDFs from the terminal.
//!
//! # Usage
//!
//! ```
//! docchat login --email alice@example.com
//! docchat upload ~/papers/owls.pdf
//! docchat chat --doc doc-owls
//! docchat --backend-url https://pdf.example.com docs
//! ```

mod app;
mod prompt;
mod repl;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use app::App;
use clap::{Parser, Subcommand};
use docchat_client::ClientConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Session database used when neither config nor flags name one.
const DEFAULT_SESSION_DB: &str = "~/.local/share/docchat/session.db";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "docchat", version, about = "Chat with your PDFs")]
struct Cli {
  /// Path to a TOML config file (backend_url, request_timeout_secs,
  /// session_db).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the docchat backend.
  #[arg(long, env = "DOCCHAT_BACKEND_URL")]
  backend_url: Option<String>,

  /// Where to keep the signed-in session.
  #[arg(long, value_name = "FILE")]
  session_db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in with email and password.
  Login {
    #[arg(long)]
    email:    Option<String>,
    #[arg(long, env = "DOCCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Create an account, then confirm it with the emailed code.
  Signup,
  /// Confirm the emailed one-time code for the current account.
  VerifyOtp {
    otp: Option<String>,
  },
  /// Forget the stored session.
  Logout,
  /// Show who is signed in.
  Whoami,
  /// List uploaded documents.
  Docs,
  /// Upload a PDF.
  Upload {
    file: PathBuf,
  },
  /// Delete a document.
  Delete {
    id: String,
  },
  /// Interactive chat about a document.
  Chat {
    /// Document to select on start.
    #[arg(long)]
    doc: Option<String>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Flags override the config file and environment.
  let mut config =
    ClientConfig::load(cli.config.as_deref()).context("failed to read configuration")?;
  if let Some(url) = cli.backend_url {
    config.backend_url = url;
  }
  let session_db = expand_tilde(
    cli
      .session_db
      .as_deref()
      .or(config.session_db.as_deref())
      .unwrap_or(Path::new(DEFAULT_SESSION_DB)),
  );

  let app = App::start(&config, &session_db).await?;

  let result = match cli.command {
    Command::Login { email, password } => app.login(email, password).await,
    Command::Signup => app.signup().await,
    Command::VerifyOtp { otp } => app.verify_otp(otp).await,
    Command::Logout => {
      app.logout().await;
      Ok(())
    }
    Command::Whoami => {
      app.whoami();
      Ok(())
    }
    Command::Docs => app.docs().await,
    Command::Upload { file } => app.upload(&file).await,
    Command::Delete { id } => app.delete(&id).await,
    Command::Chat { doc } => app.chat(doc).await,
  };

  // Let fire-and-forget calls land before the runtime goes away.
  app.settle().await;
  result
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
