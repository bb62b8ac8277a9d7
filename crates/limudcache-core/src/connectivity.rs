//! Process-wide online/offline status.
//!
//! Network events move the machine between `Online` and `SystemOffline`; the
//! user can enter or leave `UserOffline` from any state. Leaving
//! `UserOffline` lands on whatever the network last reported. Subscribers get
//! every change through a `tokio::sync::watch` channel.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Online { last_confirmed: DateTime<Utc> },
    /// The network layer reports no connectivity.
    SystemOffline,
    /// The user chose to work offline.
    UserOffline,
}

impl ConnectivityStatus {
    pub fn is_offline(&self) -> bool {
        !matches!(self, ConnectivityStatus::Online { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityStatus::Online { .. } => "online",
            ConnectivityStatus::SystemOffline => "offline",
            ConnectivityStatus::UserOffline => "offline (user)",
        }
    }
}

struct State {
    network_up: bool,
    user_offline: bool,
}

impl State {
    fn status(&self, previous: ConnectivityStatus) -> ConnectivityStatus {
        if self.user_offline {
            ConnectivityStatus::UserOffline
        } else if !self.network_up {
            ConnectivityStatus::SystemOffline
        } else {
            match previous {
                // Stay online; the timestamp is bumped by network events only
                ConnectivityStatus::Online { .. } => previous,
                _ => ConnectivityStatus::Online {
                    last_confirmed: Utc::now(),
                },
            }
        }
    }
}

/// Shared handle to the connectivity state machine. Clones observe and drive
/// the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<Mutex<State>>,
    tx: Arc<watch::Sender<ConnectivityStatus>>,
}

impl ConnectivityMonitor {
    /// Start online unless the user previously chose to work offline.
    pub fn new(user_offline: bool) -> Self {
        let state = State {
            network_up: true,
            user_offline,
        };
        let initial = state.status(ConnectivityStatus::SystemOffline);
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(Mutex::new(state)),
            tx: Arc::new(tx),
        }
    }

    /// Apply a state change and publish the resulting status. Publishing
    /// happens under the lock so concurrent updates are seen in order.
    fn update(&self, bump_confirmed: bool, change: impl FnOnce(&mut State)) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut state);

        let previous = *self.tx.borrow();
        let next = match state.status(previous) {
            ConnectivityStatus::Online { .. } if bump_confirmed => ConnectivityStatus::Online {
                last_confirmed: Utc::now(),
            },
            other => other,
        };
        if previous.label() != next.label() {
            info!(from = previous.label(), to = next.label(), "Connectivity changed");
        }
        self.tx.send_replace(next);
    }

    /// The network is usable; also refreshes the last-confirmed timestamp.
    pub fn network_online(&self) {
        self.update(true, |state| state.network_up = true);
    }

    pub fn network_offline(&self) {
        self.update(false, |state| state.network_up = false);
    }

    pub fn set_user_offline(&self, offline: bool) {
        self.update(false, |state| state.user_offline = offline);
    }

    pub fn status(&self) -> ConnectivityStatus {
        *self.tx.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.status().is_offline()
    }

    pub fn is_user_offline(&self) -> bool {
        self.status() == ConnectivityStatus::UserOffline
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
