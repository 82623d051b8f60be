use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};

use crate::measurement::Measurement;

const FILE_EXT: &str = "json";

/// Content-addressed durable queue of undelivered measurements: one file per
/// record in a flat directory, named by the SHA-256 of the record's canonical
/// bytes. The directory listing is the source of truth; there is no index.
///
/// Not safe for concurrent `save` + `publish_all` against the same directory
/// from independent callers; a single scheduled cycle owns the directory at a
/// time.
#[derive(Debug, Clone)]
pub struct PendingStore {
    dir: PathBuf,
}

impl PendingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serializes the measurement and writes it under its content digest.
    /// Re-queuing byte-identical content hits the same filename with the same
    /// bytes, so saving is naturally idempotent.
    pub async fn save(&self, measurement: &Measurement) -> Result<PathBuf> {
        measurement.validate()?;

        let bytes = measurement.canonical_bytes()?;
        let digest = measurement.digest()?;
        let path = self.dir.join(format!("{digest}.{FILE_EXT}"));

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create pending dir {}", self.dir.display()))?;
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write pending record {}", path.display()))?;

        debug!(path = %path.display(), "queued measurement");
        Ok(path)
    }

    /// Attempts to redeliver every queued record through `publish`, deleting
    /// each file as its publish succeeds. Stops at the first publish failure
    /// and returns it, leaving that record and all not-yet-attempted records
    /// in place for the next cycle; a broker outage discovered mid-replay
    /// should not be masked by silently skipping records.
    ///
    /// An unreadable or unparseable file is local corruption, not a replay
    /// failure: it is logged and skipped.
    pub async fn publish_all<F, Fut>(&self, mut publish: F) -> Result<()>
    where
        F: FnMut(Measurement) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to list pending dir {}", self.dir.display())
                })
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }

            let mut measurement = match Self::read_record(&path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unreadable pending record: {e:#}");
                    continue;
                }
            };

            // Stamped once, at the moment of delayed delivery. The on-disk
            // bytes are never rewritten.
            if measurement.upload_timestamp.is_none() {
                measurement.upload_timestamp = Some(Utc::now());
            }

            publish(measurement)
                .await
                .with_context(|| format!("failed to redeliver {}", path.display()))?;

            fs::remove_file(&path)
                .await
                .with_context(|| format!("failed to remove delivered record {}", path.display()))?;
            debug!(path = %path.display(), "redelivered pending measurement");
        }

        Ok(())
    }

    async fn read_record(path: &Path) -> Result<Measurement> {
        let bytes = fs::read(path).await?;
        let measurement = serde_json::from_slice(&bytes)?;
        Ok(measurement)
    }
}
