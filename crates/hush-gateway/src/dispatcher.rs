use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use hush_types::events::GatewayEvent;
use hush_types::models::UserId;

type ClientSender = mpsc::UnboundedSender<GatewayEvent>;

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutReport {
    /// Connections the event was queued on.
    pub delivered: usize,
    /// Audience members with no open connection.
    pub offline: usize,
    /// Connections found closed while sending; they are pruned.
    pub failed: usize,
}

/// Tracks connected clients and pushes events to explicit audiences.
///
/// Delivery is best-effort: a dead connection is skipped and removed, and
/// never stops delivery to the rest of the audience.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id -> sender). A user may hold several connections.
    clients: RwLock<HashMap<UserId, HashMap<Uuid, ClientSender>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`. Returns (conn_id, receiver).
    pub async fn register(&self, user_id: UserId) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .clients
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Unregister one connection, leaving the user's other connections alone.
    pub async fn unregister(&self, user_id: UserId, conn_id: Uuid) {
        let mut clients = self.inner.clients.write().await;
        if let Some(conns) = clients.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                clients.remove(&user_id);
            }
        }
    }

    /// Push an event to every connection of one user.
    pub async fn push_to_client(&self, user_id: UserId, event: GatewayEvent) -> FanOutReport {
        self.fan_out([user_id], event).await
    }

    /// Push an event to every connection of every user in `audience`, once.
    pub async fn fan_out<I>(&self, audience: I, event: GatewayEvent) -> FanOutReport
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut report = FanOutReport::default();
        let mut dead: Vec<(UserId, Uuid)> = Vec::new();

        {
            let clients = self.inner.clients.read().await;
            for user_id in audience {
                let Some(conns) = clients.get(&user_id) else {
                    report.offline += 1;
                    continue;
                };
                for (&conn_id, tx) in conns {
                    if tx.send(event.clone()).is_ok() {
                        report.delivered += 1;
                    } else {
                        report.failed += 1;
                        dead.push((user_id, conn_id));
                    }
                }
            }
        }

        if !dead.is_empty() {
            warn!("Dropping {} closed gateway connections", dead.len());
            for (user_id, conn_id) in dead {
                self.unregister(user_id, conn_id).await;
            }
        }

        debug!(
            "Fan-out: {} delivered, {} offline, {} failed",
            report.delivered, report.offline, report.failed
        );
        report
    }

    /// Number of open connections for a user.
    pub async fn connection_count(&self, user_id: UserId) -> usize {
        self.inner
            .clients
            .read()
            .await
            .get(&user_id)
            .map_or(0, HashMap::len)
    }
}
