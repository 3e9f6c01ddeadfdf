//! Catalog test methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog test method offered by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMethod {
    pub id: Uuid,
    /// Method code (unique, e.g. `ASTM D638`).
    pub code: String,
    pub name: String,
    /// Owning capability. NTR submissions are split along this field.
    pub capability_id: Uuid,
    pub equipment_id: Option<Uuid>,
    /// Price per testing sample.
    pub price: f64,
    pub turnaround_days: i64,
    pub sample_requirement: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestMethod {
    pub fn new(code: impl Into<String>, name: impl Into<String>, capability_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            capability_id,
            equipment_id: None,
            price: 0.0,
            turnaround_days: 0,
            sample_requirement: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMethodUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub capability_id: Option<Uuid>,
    pub equipment_id: Option<Option<Uuid>>,
    pub price: Option<f64>,
    pub turnaround_days: Option<i64>,
    pub sample_requirement: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct TestMethodFilter {
    pub capability_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
