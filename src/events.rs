//! In-process change signals.
//!
//! Mutating operations publish a signal so sibling surfaces know to refetch.
//! Signals are not persisted and never leave the process except through the
//! SSE feed in `web`.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signal {
    OffersChanged,
    SavesChanged,
    UsersChanged,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::OffersChanged => "offers-changed",
            Signal::SavesChanged => "saves-changed",
            Signal::UsersChanged => "users-changed",
        }
    }
}

#[derive(Clone)]
pub struct Signals {
    tx: broadcast::Sender<Signal>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Fire-and-forget: nobody listening is fine.
    pub fn notify(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            tracing::debug!(signal = signal.as_str(), "no subscribers for signal");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}
