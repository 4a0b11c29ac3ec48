//! Role registry: which organizational role each custody operation requires.
//!
//! Roles are opaque strings compared by exact equality. The manufacturer and
//! regulator roles are configuration handed to the engine at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::BatchRecord;

/// Manufacturer role of the reference deployment.
pub const DEFAULT_MANUFACTURER_ROLE: &str = "Cipla";
/// Regulator role of the reference deployment.
pub const DEFAULT_REGULATOR_ROLE: &str = "CDSCO";

/// Every operation the ledger exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustodyOperation {
    Register,
    TransferCustody,
    MarkDelivered,
    Recall,
    Track,
}

impl CustodyOperation {
    /// Verb used in log lines and error messages.
    pub fn verb(self) -> &'static str {
        match self {
            CustodyOperation::Register => "register",
            CustodyOperation::TransferCustody => "transfer",
            CustodyOperation::MarkDelivered => "deliver",
            CustodyOperation::Recall => "recall",
            CustodyOperation::Track => "track",
        }
    }
}

impl fmt::Display for CustodyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Who may perform an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Exactly this configured role.
    Role(String),
    /// Whoever the record names as current custodian.
    Custodian,
    /// No restriction.
    Anyone,
}

/// Configured role names for the role-gated operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleRegistry {
    pub manufacturer: String,
    pub regulator: String,
}

impl RoleRegistry {
    pub fn new(manufacturer: impl Into<String>, regulator: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            regulator: regulator.into(),
        }
    }

    pub fn requirement(&self, operation: CustodyOperation) -> RoleRequirement {
        match operation {
            CustodyOperation::Register => RoleRequirement::Role(self.manufacturer.clone()),
            CustodyOperation::Recall => RoleRequirement::Role(self.regulator.clone()),
            CustodyOperation::TransferCustody | CustodyOperation::MarkDelivered => {
                RoleRequirement::Custodian
            }
            CustodyOperation::Track => RoleRequirement::Anyone,
        }
    }

    /// Check `role` against the requirement of `operation`.
    ///
    /// On rejection returns the role that would have been accepted. A
    /// custodian-gated check without a record always rejects.
    pub fn authorize(
        &self,
        operation: CustodyOperation,
        role: &str,
        record: Option<&BatchRecord>,
    ) -> Result<(), String> {
        match self.requirement(operation) {
            RoleRequirement::Anyone => Ok(()),
            RoleRequirement::Role(required) if role == required => Ok(()),
            RoleRequirement::Role(required) => Err(required),
            RoleRequirement::Custodian => match record {
                Some(r) if r.current_custodian == role => Ok(()),
                Some(r) => Err(r.current_custodian.clone()),
                None => Err("<current custodian>".to_string()),
            },
        }
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MANUFACTURER_ROLE, DEFAULT_REGULATOR_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_requires_exact_manufacturer_role() {
        let roles = RoleRegistry::default();
        assert!(roles
            .authorize(CustodyOperation::Register, "Cipla", None)
            .is_ok());
        assert_eq!(
            roles.authorize(CustodyOperation::Register, "CiplaMSP", None),
            Err("Cipla".to_string())
        );
        assert!(roles
            .authorize(CustodyOperation::Register, "cipla", None)
            .is_err());
    }

    #[test]
    fn track_is_unrestricted() {
        let roles = RoleRegistry::new("M", "R");
        assert!(roles.authorize(CustodyOperation::Track, "", None).is_ok());
    }

    #[test]
    fn custodian_check_without_record_rejects() {
        let roles = RoleRegistry::default();
        assert!(roles
            .authorize(CustodyOperation::TransferCustody, "Cipla", None)
            .is_err());
    }
}
