use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::broker::Publisher;
use crate::measurement::Measurement;

/// Publisher whose outcome can be flipped between cycles, with a call count.
pub struct FlakyPublisher {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyPublisher {
    pub fn acking() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FlakyPublisher {
    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow!("simulated broker failure"))
        } else {
            Ok(())
        }
    }
}

pub fn sample_measurement() -> Measurement {
    let mut m = Measurement::new(
        "porch",
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    );
    m.temp = Some(18.25);
    m.rh = Some(54.0);
    m
}
