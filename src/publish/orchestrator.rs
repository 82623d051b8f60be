use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::broker::ConnectionSet;
use crate::measurement::Measurement;

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// The broker did not acknowledge within the attempt's deadline. The
    /// underlying I/O may still complete; its result is ignored.
    Timeout(Duration),
    /// The broker (or the transport to it) reported an explicit error.
    Error(String),
}

/// One backend's failed publish attempt, preserving which backend failed and
/// why.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendFailure {
    pub backend: String,
    pub kind: FailureKind,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Timeout(dur) => {
                write!(f, "[{}] publish timed out after {:?}", self.backend, dur)
            }
            FailureKind::Error(msg) => write!(f, "[{}] failed to publish: {}", self.backend, msg),
        }
    }
}

fn render_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregate of every failed attempt in one fan-out. Backends that succeeded
/// are not listed; their publishes stand regardless of this error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", render_failures(.failures))]
pub struct PublishError {
    pub failures: Vec<BackendFailure>,
}

impl PublishError {
    pub fn failed_backends(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.backend.as_str()).collect()
    }
}

/// Fans a single measurement out to every configured broker backend
/// concurrently, applying a per-attempt timeout, and waits for all attempts
/// to resolve before returning. No attempt is abandoned early; the slowest
/// backend determines the cycle's latency.
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    timeout: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Publishes the measurement to every connection in the set. Ok only if
    /// every attempt was acknowledged; otherwise the aggregated error names
    /// each failing backend. A failure on one backend never voids another
    /// backend's acknowledged publish.
    pub async fn publish(
        &self,
        measurement: &Measurement,
        connections: &ConnectionSet,
    ) -> Result<(), PublishError> {
        let mut failures = Vec::new();
        let mut tasks: JoinSet<Option<BackendFailure>> = JoinSet::new();

        for (name, conn) in connections.iter() {
            // Each connection publishes as its own device.
            let mut stamped = measurement.clone();
            stamped.device_id = conn.device_id.clone();

            let payload = match stamped
                .canonical_bytes()
                .map_err(anyhow::Error::from)
                .and_then(|bytes| conn.kind.encode(&bytes))
            {
                Ok(payload) => payload,
                Err(e) => {
                    failures.push(BackendFailure {
                        backend: name.clone(),
                        kind: FailureKind::Error(format!("{e:#}")),
                    });
                    continue;
                }
            };

            let backend = name.clone();
            let publisher = conn.publisher.clone();
            let topic = conn.telemetry_topic();
            let deadline = self.timeout;

            tasks.spawn(async move {
                match timeout(deadline, publisher.publish(&topic, payload)).await {
                    Ok(Ok(())) => {
                        info!(backend, "successful publish");
                        None
                    }
                    Ok(Err(e)) => Some(BackendFailure {
                        backend,
                        kind: FailureKind::Error(format!("{e:#}")),
                    }),
                    Err(_) => Some(BackendFailure {
                        backend,
                        kind: FailureKind::Timeout(deadline),
                    }),
                }
            });
        }

        // Join barrier: every attempt resolves (ack, error, or timeout)
        // before we report anything.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(failure)) => {
                    warn!("{failure}");
                    failures.push(failure);
                }
                Ok(None) => {}
                Err(e) => failures.push(BackendFailure {
                    backend: "unknown".to_string(),
                    kind: FailureKind::Error(format!("publish task panicked: {e}")),
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { failures })
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
