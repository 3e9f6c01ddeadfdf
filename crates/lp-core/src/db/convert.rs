//! Column conversions shared by the SQLite row types.
//!
//! SQLite stores ids as TEXT UUIDs and timestamps as RFC 3339 TEXT.

use super::DbError;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn uuid(value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Serialization(format!("Invalid UUID: {}", e)))
}

pub(crate) fn opt_uuid(value: Option<String>) -> Result<Option<Uuid>, DbError> {
    value.as_deref().map(uuid).transpose()
}

pub(crate) fn timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Serialization(format!("Invalid timestamp: {}", e)))
}

pub(crate) fn opt_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    value.as_deref().map(timestamp).transpose()
}

/// Parses a snake_case enum column.
pub(crate) fn enum_value<T: FromStr>(column: &str, value: &str) -> Result<T, DbError> {
    value
        .parse::<T>()
        .map_err(|_| DbError::Serialization(format!("Invalid {}: {}", column, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        assert_eq!(timestamp(&now.to_rfc3339()).unwrap(), now);
        assert!(timestamp("yesterday").is_err());
    }

    #[test]
    fn test_enum_value() {
        let status: RequestStatus = enum_value("status", "in_progress").unwrap();
        assert_eq!(status, RequestStatus::InProgress);

        let err = enum_value::<RequestStatus>("status", "lost").unwrap_err();
        assert!(err.to_string().contains("Invalid status: lost"));
    }

    #[test]
    fn test_optional_columns() {
        assert_eq!(opt_uuid(None).unwrap(), None);
        assert!(opt_uuid(Some("nope".to_string())).is_err());
        assert_eq!(opt_timestamp(None).unwrap(), None);
    }
}
