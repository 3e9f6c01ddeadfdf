//! Internal orders (budget codes) that requests are charged to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An internal order number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Io {
    pub id: Uuid,
    /// IO number (unique).
    pub io_number: String,
    pub name: String,
    pub responsible: Option<String>,
    pub cost_center: Option<String>,
    /// Closed IOs cannot be charged by new requests.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Io {
    pub fn new(io_number: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            io_number: io_number.into(),
            name: name.into(),
            responsible: None,
            cost_center: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoUpdate {
    pub io_number: Option<String>,
    pub name: Option<String>,
    pub responsible: Option<Option<String>>,
    pub cost_center: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct IoFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
