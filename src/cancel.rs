//! Cooperative cancellation for one pipeline run.
//!
//! A [`CancelToken`] is created per run, set at most once, and never reset.
//! It is observed at every blocking point: the walker before emitting a
//! path, and each digest worker before taking a path and before emitting a
//! result.
//!
//! # Why a channel and not an `AtomicBool`
//!
//! The walker and workers block on bounded channel sends for backpressure.
//! A flag alone cannot wake a blocked sender; a receiver that disconnects
//! when the run is canceled can be selected alongside the send, so every
//! blocked operation unblocks promptly on cancellation.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Shared cancellation signal for a single pipeline run.
///
/// Cloning is cheap; all clones observe the same signal. No payload is ever
/// sent on the internal channel: cancellation is the channel disconnecting.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    /// Held until cancellation; dropping it disconnects `done`.
    guard: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl CancelToken {
    /// Creates a fresh, un-canceled token.
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                guard: Mutex::new(Some(tx)),
                done: rx,
            }),
        }
    }

    /// Signals cancellation. Idempotent; stays set for the rest of the run.
    pub fn cancel(&self) {
        self.inner
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_canceled(&self) -> bool {
        matches!(self.inner.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that disconnects on cancellation.
    ///
    /// Intended for `crossbeam_channel::select!` arms; a `recv` on this
    /// channel completes only when the run is canceled.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_uncanceled() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(token.is_canceled());
        assert!(clone.is_canceled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn done_unblocks_a_waiting_receiver() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || {
                // Completes only via disconnect.
                let _ = token.done().recv();
            })
        };
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        waiter.join().expect("waiter panicked");
    }
}
