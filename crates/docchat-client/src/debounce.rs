//! Debounced values: the settled value only follows the latest input once
//! input has been quiet for a fixed window.

use std::{
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use tokio::task::JoinHandle;

/// Quiet period before a search term takes effect.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

struct Inner<T> {
  latest:     T,
  settled:    T,
  generation: u64,
}

/// A timer + generation counter debounce. Each [`Debounced::set`] starts a
/// timer tagged with a new generation; when a timer fires it only commits
/// if no newer value arrived in the meantime, so the last value wins.
///
/// Cheap to clone; clones share state. `set` needs a tokio runtime.
#[derive(Clone)]
pub struct Debounced<T> {
  inner:  Arc<Mutex<Inner<T>>>,
  window: Duration,
}

impl<T> Debounced<T>
where
  T: Clone + Send + 'static,
{
  pub fn new(initial: T, window: Duration) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        latest:     initial.clone(),
        settled:    initial,
        generation: 0,
      })),
      window,
    }
  }

  fn lock(&self) -> MutexGuard<'_, Inner<T>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Record a new input. It becomes the settled value after the window
  /// unless superseded first.
  pub fn set(&self, value: T) -> JoinHandle<()> {
    let generation = {
      let mut inner = self.lock();
      inner.generation += 1;
      inner.latest = value.clone();
      inner.generation
    };

    let shared = Arc::clone(&self.inner);
    let window = self.window;
    tokio::spawn(async move {
      tokio::time::sleep(window).await;
      let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
      if inner.generation == generation {
        inner.settled = value;
      }
    })
  }

  /// The most recent input, settled or not.
  pub fn latest(&self) -> T { self.lock().latest.clone() }

  /// The value downstream consumers should act on.
  pub fn settled(&self) -> T { self.lock().settled.clone() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn settles_after_window() {
    let d = Debounced::new(String::new(), SEARCH_DEBOUNCE);
    d.set("rev".into());
    assert_eq!(d.latest(), "rev");
    assert_eq!(d.settled(), "");

    tokio::time::sleep(Duration::from_millis(299)).await;
    assert_eq!(d.settled(), "");

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(d.settled(), "rev");
  }

  #[tokio::test(start_paused = true)]
  async fn last_value_wins_during_burst() {
    let d = Debounced::new(String::new(), SEARCH_DEBOUNCE);
    for term in ["r", "re", "rev"] {
      d.set(term.into());
      tokio::time::sleep(Duration::from_millis(100)).await;
    }
    // "r" and "re" timers have expired but were superseded.
    assert_eq!(d.settled(), "");

    tokio::time::sleep(SEARCH_DEBOUNCE).await;
    assert_eq!(d.settled(), "rev");
  }

  #[tokio::test(start_paused = true)]
  async fn awaiting_the_handle_settles() {
    let d = Debounced::new(0u32, SEARCH_DEBOUNCE);
    d.set(7).await.unwrap();
    assert_eq!(d.settled(), 7);
  }
}
