//! Lab equipment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Operational status of a piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    Retired,
}

impl EquipmentStatus {
    /// Returns the database-compatible string representation (snake_case).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::InUse => "in_use",
            EquipmentStatus::Maintenance => "maintenance",
            EquipmentStatus::Retired => "retired",
        }
    }

    /// Returns true if the equipment can be booked through a reservation.
    pub fn is_bookable(&self) -> bool {
        matches!(self, EquipmentStatus::Available | EquipmentStatus::InUse)
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for EquipmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(EquipmentStatus::Available),
            "in_use" => Ok(EquipmentStatus::InUse),
            "maintenance" => Ok(EquipmentStatus::Maintenance),
            "retired" => Ok(EquipmentStatus::Retired),
            _ => Err(()),
        }
    }
}

/// A piece of lab equipment owned by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    /// Asset code (unique).
    pub code: String,
    pub name: String,
    pub capability_id: Uuid,
    pub location_id: Option<Uuid>,
    pub status: EquipmentStatus,
    /// Whether researchers may book it through an equipment reservation.
    pub reservable: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    pub fn new(code: impl Into<String>, name: impl Into<String>, capability_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            capability_id,
            location_id: None,
            status: EquipmentStatus::Available,
            reservable: false,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub capability_id: Option<Uuid>,
    pub location_id: Option<Option<Uuid>>,
    pub status: Option<EquipmentStatus>,
    pub reservable: Option<bool>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub capability_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<EquipmentStatus>,
    pub reservable: Option<bool>,
    pub search: Option<String>,
}
