//! Batch record data model.
//!
//! A `BatchRecord` is the persisted state of one pharmaceutical batch. The
//! descriptive attributes are fixed at registration; only the custodian,
//! status, recall flag and the two append-only logs change afterwards, and
//! only through the transition engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::log::AppendLog;

/// Placeholder party used where an event has no counterparty.
pub const NO_PARTY: &str = "-";

/// Lifecycle status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    InProduction,
    InTransit,
    Delivered,
    Recalled,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::InProduction => "InProduction",
            BatchStatus::InTransit => "InTransit",
            BatchStatus::Delivered => "Delivered",
            BatchStatus::Recalled => "Recalled",
        }
    }

    /// Recalled is absorbing: no status transition leaves it.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Recalled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InProduction" => Ok(BatchStatus::InProduction),
            "InTransit" => Ok(BatchStatus::InTransit),
            "Delivered" => Ok(BatchStatus::Delivered),
            "Recalled" => Ok(BatchStatus::Recalled),
            other => Err(format!("unknown batch status '{}'", other)),
        }
    }
}

/// Kind of a history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Shipped,
    Delivered,
    Recalled,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "Created",
            EventKind::Shipped => "Shipped",
            EventKind::Delivered => "Delivered",
            EventKind::Recalled => "Recalled",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a batch's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub timestamp: String,
    pub event_kind: EventKind,
    pub from_party: String,
    pub to_party: String,
    pub detail: String,
}

/// Renders the single-line `timestamp|kind|from|to|detail` form.
impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.timestamp, self.event_kind, self.from_party, self.to_party, self.detail
        )
    }
}

/// Attributes supplied when registering a new batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub identifier: String,
    pub product_name: String,
    pub batch_number: String,
    #[serde(default)]
    pub manufacture_date: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub composition: String,
}

/// Persisted state of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub identifier: String,
    pub product_name: String,
    pub manufacturer_name: String,
    pub batch_number: String,
    pub manufacture_date: String,
    pub expiry_date: String,
    pub composition: String,
    pub current_custodian: String,
    pub status: BatchStatus,
    pub recalled: bool,
    pub history: AppendLog<HistoryEvent>,
    pub inspection_notes: AppendLog<String>,
}

impl BatchRecord {
    /// A recall is final whether the flag or the status records it.
    pub fn is_recalled(&self) -> bool {
        self.recalled || self.status.is_terminal()
    }

    /// True when every immutable attribute of `self` matches `other`.
    pub fn same_attributes(&self, other: &BatchRecord) -> bool {
        self.identifier == other.identifier
            && self.product_name == other.product_name
            && self.manufacturer_name == other.manufacturer_name
            && self.batch_number == other.batch_number
            && self.manufacture_date == other.manufacture_date
            && self.expiry_date == other.expiry_date
            && self.composition == other.composition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_event_renders_legacy_line() {
        let event = HistoryEvent {
            timestamp: "2025-03-01 10:00:00".to_string(),
            event_kind: EventKind::Created,
            from_party: "Cipla".to_string(),
            to_party: NO_PARTY.to_string(),
            detail: "Batch: B100".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "2025-03-01 10:00:00|Created|Cipla|-|Batch: B100"
        );
    }

    #[test]
    fn status_parses_from_wire_name() {
        assert_eq!(
            "InTransit".parse::<BatchStatus>(),
            Ok(BatchStatus::InTransit)
        );
        assert!("Lost".parse::<BatchStatus>().is_err());
        assert!(BatchStatus::Recalled.is_terminal());
        assert!(!BatchStatus::Delivered.is_terminal());
    }

    #[test]
    fn new_batch_optional_fields_default_to_empty() {
        let batch: NewBatch = serde_json::from_str(
            r#"{"identifier":"DRUG-1","productName":"ParacetamolX","batchNumber":"B100"}"#,
        )
        .unwrap();
        assert_eq!(batch.composition, "");
        assert_eq!(batch.expiry_date, "");
    }
}
