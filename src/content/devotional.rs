use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::calendar::CalendarSlot;
use crate::config::SLOT_COUNT;

/// One day's devotional entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevotionalRecord {
    pub title: String,
    pub reading: String,
    pub message: String,
    pub prayer: String,
    pub practice: String,
}

/// The full devotional calendar, immutable once parsed.
#[derive(Debug, Clone)]
pub struct DevotionalSet {
    records: Vec<DevotionalRecord>,
}

impl DevotionalSet {
    /// Parse the devotional resource. Anything other than exactly 365
    /// records is rejected.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let records: Vec<DevotionalRecord> = serde_json::from_slice(data)?;
        if records.len() != SLOT_COUNT as usize {
            return Err(anyhow!(
                "devotional set has {} records, expected {}",
                records.len(),
                SLOT_COUNT
            ));
        }
        Ok(Self { records })
    }

    /// Record for the given slot. Slot indices are 1-based.
    pub fn record(&self, slot: &CalendarSlot) -> &DevotionalRecord {
        &self.records[(slot.index - 1) as usize]
    }
}
