//! Tracks live client connections so they can be closed on shutdown.
//!
//! The registry holds no application state, only a one-shot close request per
//! connection. Each connection task owns the receiving half and reacts to it.

use std::{collections::HashMap, time::Duration};
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<Uuid, Option<oneshot::Sender<()>>>,
    shutting_down: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
    drained: Notify,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns the receiver of its shutdown request.
    ///
    /// Returns `None` once shutdown has begun; the caller must close the transport.
    pub async fn register(&self, id: Uuid) -> Option<oneshot::Receiver<()>> {
        let mut inner = self.inner.lock().await;
        if inner.shutting_down {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        inner.connections.insert(id, Some(tx));
        Some(rx)
    }

    pub async fn unregister(&self, id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.connections.remove(&id);
        if inner.connections.is_empty() {
            self.drained.notify_waiters();
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Asks every registered connection to close and refuses new ones.
    ///
    /// Entries stay registered until their task unregisters, so `wait_drained`
    /// observes the actual teardown.
    pub async fn close_all(&self) {
        let mut inner = self.inner.lock().await;
        inner.shutting_down = true;
        info!(
            connections = inner.connections.len(),
            "Closing all client connections."
        );
        for (id, slot) in inner.connections.iter_mut() {
            let Some(tx) = slot.take() else { continue };
            if tx.send(()).is_err() {
                warn!(connection_id = %id, "Failed to close client connection: task already gone.");
            }
        }
    }

    /// Waits until every connection has unregistered, or until `limit` elapses.
    ///
    /// Returns `true` when fully drained.
    pub async fn wait_drained(&self, limit: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                if self.is_empty().await {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, wait).await.is_ok()
    }
}
