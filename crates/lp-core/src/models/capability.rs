//! Capabilities: the lab units that own test methods and equipment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organizational lab unit offering specific test methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name (unique).
    pub name: String,
    /// Short code used in request numbers (unique, e.g. `RHE`).
    pub short_name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Last run number handed out for this capability.
    pub req_run_no: i64,
    /// Inactive capabilities accept no new requests.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Capability {
    /// Creates a new active capability with a zero run counter.
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            short_name: short_name.into().to_uppercase(),
            description: None,
            req_run_no: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a capability. The run counter is not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityUpdate {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Filter for listing capabilities.
#[derive(Debug, Clone, Default)]
pub struct CapabilityFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Returns true if `short_name` is 2-6 uppercase ASCII letters or digits.
pub fn is_valid_short_name(short_name: &str) -> bool {
    (2..=6).contains(&short_name.len())
        && short_name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
