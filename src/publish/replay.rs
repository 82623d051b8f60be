use anyhow::Result;
use tracing::info;

use crate::broker::ConnectionSet;
use crate::pending::PendingStore;
use crate::publish::Orchestrator;

/// Drains the pending store through the orchestrator after a successful
/// publish cycle. Replay is strictly sequential: one record fully resolves
/// before the next is attempted, and a failure stops the sweep (inherited
/// from [`PendingStore::publish_all`]).
#[derive(Debug, Clone)]
pub struct ReplayDriver {
    store: PendingStore,
    orchestrator: Orchestrator,
}

impl ReplayDriver {
    pub fn new(store: PendingStore, orchestrator: Orchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Attempts to redeliver every queued measurement to all connections.
    /// Unlike a fresh publish, a failed redelivery is not re-queued; the
    /// record is already on disk and stays there.
    pub async fn drain(&self, connections: &ConnectionSet) -> Result<()> {
        let orchestrator = self.orchestrator;
        self.store
            .publish_all(|measurement| async move {
                orchestrator.publish(&measurement, connections).await?;
                Ok(())
            })
            .await?;

        info!("pending store drained");
        Ok(())
    }
}
