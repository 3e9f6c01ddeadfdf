//! Portal users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submits requests and follows their progress.
    #[default]
    Researcher,
    /// Works samples through the lab and maintains the catalog.
    LabStaff,
    /// Full access, including backup and restore.
    Admin,
}

impl Role {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Researcher => "researcher",
            Role::LabStaff => "lab_staff",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "researcher" => Ok(Role::Researcher),
            "lab_staff" | "labstaff" => Ok(Role::LabStaff),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// A user in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Email address (unique).
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Home capability for lab staff.
    pub capability_id: Option<Uuid>,
    pub department: Option<String>,
    /// Inactive users cannot submit requests.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active user.
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            role,
            capability_id: None,
            department: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update fields for a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub capability_id: Option<Option<Uuid>>,
    pub department: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Filter for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub capability_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
