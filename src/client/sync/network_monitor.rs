//! # Network Monitor
//!
//! Owns the device's current online/offline state and turns changes into
//! edge-triggered events.
//!
//! ## Features
//!
//! - **Current state**: a single `NetworkStatus`, cheap to read from anywhere
//! - **Edge events**: `BecameOnline` / `BecameOffline`, only on real changes
//! - **Flap collapsing**: a listener that falls behind sees only the latest
//!   state, so a burst of flaps produces at most one event
//! - **Probing**: native hosts have no browser `online` event, so the monitor
//!   can poll the remote health endpoint and feed results back in
//!
//! The monitor is a cloneable handle; all clones share one state. Nothing is
//! persisted: the host supplies the initial state at startup.

use crate::client::remote_api::RemoteApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

/// Connectivity transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

impl ConnectivityEvent {
    fn entering(status: NetworkStatus) -> Self {
        match status {
            NetworkStatus::Online => ConnectivityEvent::BecameOnline,
            NetworkStatus::Offline => ConnectivityEvent::BecameOffline,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    status: Arc<watch::Sender<NetworkStatus>>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (status, _) = watch::channel(initial);
        Self {
            status: Arc::new(status),
        }
    }

    pub fn get_status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.get_status() == NetworkStatus::Online
    }

    /// Record the platform's connectivity signal
    ///
    /// Returns the event raised, or `None` when the state did not change.
    pub fn set_status(&self, status: NetworkStatus) -> Option<ConnectivityEvent> {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if !changed {
            return None;
        }
        match status {
            NetworkStatus::Online => tracing::info!("network: online"),
            NetworkStatus::Offline => tracing::warn!("network: offline"),
        }
        Some(ConnectivityEvent::entering(status))
    }

    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        self.set_status(NetworkStatus::from_online(online))
    }

    /// Subscribe to transitions from the current state onward
    pub fn events(&self) -> ConnectivityEvents {
        let rx = self.status.subscribe();
        let last = *rx.borrow();
        ConnectivityEvents { rx, last }
    }

    /// Poll `api.ping()` every `interval` and record the result
    pub fn spawn_probe(&self, api: Arc<dyn RemoteApi>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = api.ping().await;
                monitor.set_online(online);
            }
        })
    }
}

/// Stream of edge events for one listener
#[derive(Debug)]
pub struct ConnectivityEvents {
    rx: watch::Receiver<NetworkStatus>,
    last: NetworkStatus,
}

impl ConnectivityEvents {
    /// Wait for the next transition. `None` once every monitor handle is gone.
    pub async fn next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let status = *self.rx.borrow_and_update();
            // Offline and back again before we looked: nothing to report.
            if status != self.last {
                self.last = status;
                return Some(ConnectivityEvent::entering(status));
            }
        }
    }
}
