//! [`SqliteSessionStore`] — the SQLite implementation of [`SessionStore`].

use std::path::Path;

use docchat_core::{
  session::{Credential, User},
  store::{SessionStore, StoredSession},
};

use crate::{Error, Result, schema::SCHEMA};

/// Key of the bearer token entry.
pub const TOKEN_KEY: &str = "app_token";
/// Key of the JSON-serialised user profile entry.
pub const USER_KEY: &str = "app_user";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A session store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// statements run on the connection's own thread, one after another, so a
/// read can never interleave with a half-applied write.
#[derive(Clone)]
pub struct SqliteSessionStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSessionStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read both entries in one statement.
  pub(crate) async fn read_pair(&self) -> Result<(Option<String>, Option<String>)> {
    let pair = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE key IN (?1, ?2)")?;
        let rows = stmt.query_map(rusqlite::params![TOKEN_KEY, USER_KEY], |r| {
          Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;

        let (mut token, mut user) = (None, None);
        for row in rows {
          let (key, value) = row?;
          match key.as_str() {
            TOKEN_KEY => token = Some(value),
            USER_KEY => user = Some(value),
            _ => {}
          }
        }
        Ok((token, user))
      })
      .await?;
    Ok(pair)
  }

  /// Write a raw entry, bypassing the pairing rules. Lets tests plant
  /// corrupt or partial payloads.
  #[cfg(test)]
  pub(crate) async fn put_raw(&self, key: &'static str, value: &str) -> Result<()> {
    let value = value.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Turn the raw entries into a session, rejecting anything but a complete,
/// well-formed pair.
fn decode(token: Option<String>, user: Option<String>) -> Result<Option<StoredSession>> {
  match (token, user) {
    (None, None) => Ok(None),
    (None, Some(_)) => Err(Error::Incomplete("token missing")),
    (Some(_), None) => Err(Error::Incomplete("user missing")),
    (Some(token), Some(_)) if token.is_empty() => Err(Error::Incomplete("token empty")),
    (Some(token), Some(user)) => {
      let user: User = serde_json::from_str(&user)?;
      Ok(Some(StoredSession { user, token: Credential::new(token) }))
    }
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteSessionStore {
  type Error = Error;

  async fn load(&self) -> Option<StoredSession> {
    let decoded = match self.read_pair().await {
      Ok((token, user)) => decode(token, user),
      Err(e) => Err(e),
    };
    match decoded {
      Ok(session) => session,
      Err(e) => {
        tracing::warn!("ignoring unreadable stored session: {e}");
        None
      }
    }
  }

  async fn save(&self, user: &User, token: &Credential) -> Result<()> {
    let user_json = serde_json::to_string(user)?;
    let token = token.as_str().to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (key, value) in [(TOKEN_KEY, &token), (USER_KEY, &user_json)] {
          tx.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM kv WHERE key IN (?1, ?2)",
          rusqlite::params![TOKEN_KEY, USER_KEY],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
