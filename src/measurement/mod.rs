use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Static table of the metric fields a measurement can carry. Used for the
/// human-readable summary; extending the record means adding a row here and a
/// field below.
const METRICS: &[MetricSpec] = &[
    MetricSpec {
        field: "temp",
        display: "temperature",
        unit: "°C",
        get: |m| m.temp,
    },
    MetricSpec {
        field: "pm25",
        display: "PM2.5",
        unit: "μg/m³",
        get: |m| m.pm25,
    },
    MetricSpec {
        field: "pm10",
        display: "PM10",
        unit: "μg/m³",
        get: |m| m.pm10,
    },
    MetricSpec {
        field: "rh",
        display: "relative humidity",
        unit: "%",
        get: |m| m.rh,
    },
];

struct MetricSpec {
    #[allow(dead_code)]
    field: &'static str,
    display: &'static str,
    unit: &'static str,
    get: fn(&Measurement) -> Option<f32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidMeasurement {
    #[error("measurement has a zero capture timestamp")]
    ZeroTimestamp,
    #[error("measurement has an empty device id")]
    EmptyDeviceId,
}

/// One reading taken by the sensing collaborator. Immutable once constructed,
/// except for `upload_timestamp`, which is stamped exactly once when a queued
/// measurement is redelivered.
///
/// Field order is the canonical serialization order; the content digest is
/// computed over these bytes, so reordering fields changes identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub upload_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pm25: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pm10: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rh: Option<f32>,
}

impl Measurement {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            upload_timestamp: None,
            temp: None,
            pm25: None,
            pm10: None,
            rh: None,
        }
    }

    /// A measurement with a zero capture timestamp must never reach the queue
    /// or a broker; queuing one would poison later replay.
    pub fn validate(&self) -> Result<(), InvalidMeasurement> {
        if self.timestamp.timestamp() == 0 && self.timestamp.timestamp_subsec_nanos() == 0 {
            return Err(InvalidMeasurement::ZeroTimestamp);
        }
        if self.device_id.is_empty() {
            return Err(InvalidMeasurement::EmptyDeviceId);
        }
        Ok(())
    }

    /// Canonical byte form: JSON with fields in declaration order and absent
    /// metrics omitted. This is both the pending-file content and the input
    /// to the content digest.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Lowercase hex SHA-256 of the canonical bytes.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = self.canonical_bytes()?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// One-line rendering of the populated metrics, for logs and dry runs.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for spec in METRICS {
            if let Some(v) = (spec.get)(self) {
                parts.push(format!("{} {:.2}{}", spec.display, v, spec.unit));
            }
        }

        if parts.is_empty() {
            format!("{} @ {}: no metrics", self.device_id, self.timestamp.to_rfc3339())
        } else {
            format!(
                "{} @ {}: {}",
                self.device_id,
                self.timestamp.to_rfc3339(),
                parts.join(", ")
            )
        }
    }
}
