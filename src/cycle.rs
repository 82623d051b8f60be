use anyhow::Result;
use tracing::{error, info, warn};

use crate::broker::ConnectionSet;
use crate::measurement::Measurement;
use crate::pending::PendingStore;
use crate::publish::{Orchestrator, ReplayDriver};

/// One scheduled delivery cycle: publish the fresh measurement to every
/// backend, queue it on any failure, and drain the pending store after a
/// fully successful publish. A failed publish is never fatal to the cycle.
pub struct DeliveryCycle {
    orchestrator: Orchestrator,
    store: PendingStore,
    replay: ReplayDriver,
}

impl DeliveryCycle {
    pub fn new(orchestrator: Orchestrator, store: PendingStore) -> Self {
        let replay = ReplayDriver::new(store.clone(), orchestrator);
        Self {
            orchestrator,
            store,
            replay,
        }
    }

    /// Runs the cycle for one measurement. Returns Err only for an invalid
    /// measurement; delivery failures are absorbed into the pending queue.
    pub async fn run(&self, measurement: &Measurement, connections: &ConnectionSet) -> Result<()> {
        // An invalid measurement is dropped here, before it can reach the
        // queue or a broker.
        measurement.validate()?;

        if connections.is_empty() {
            warn!("no broker connections configured, queuing measurement");
            self.save(measurement).await;
            return Ok(());
        }

        match self.orchestrator.publish(measurement, connections).await {
            Ok(()) => {
                info!("published: {}", measurement.summary());

                // All backends acked, so the network is up; drain anything
                // queued by earlier cycles.
                if let Err(e) = self.replay.drain(connections).await {
                    warn!("failed to publish all pending measurements: {e:#}");
                }
            }
            Err(publish_err) => {
                warn!("publish failed, queuing measurement: {publish_err}");
                // The whole measurement is re-queued even if some backend
                // acked; redelivering to an already-acked backend is the
                // accepted cost of at-least-once delivery.
                self.save(measurement).await;
            }
        }

        Ok(())
    }

    async fn save(&self, measurement: &Measurement) {
        // A save failure means the measurement is lost; log it explicitly,
        // there is no secondary fallback.
        if let Err(e) = self.store.save(measurement).await {
            error!("failed to save measurement, data lost: {e:#}");
        }
    }
}
