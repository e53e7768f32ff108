//! Domain model: ticket records, status/priority enums, snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum ticket number length in bytes.
pub const MAX_TICKET_NUMBER_LEN: usize = 50;

/// Maximum title length in bytes.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum description length in bytes; longer values are truncated.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Pending,
    OnHold,
    Resolved,
    Closed,
    Reopened,
    Cancelled,
}

impl TicketStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Pending => "PENDING",
            Self::OnHold => "ON_HOLD",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
            Self::Reopened => "REOPENED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PENDING" => Ok(Self::Pending),
            "ON_HOLD" => Ok(Self::OnHold),
            "RESOLVED" => Ok(Self::Resolved),
            "CLOSED" => Ok(Self::Closed),
            "REOPENED" => Ok(Self::Reopened),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(InvalidEnumValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(InvalidEnumValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that is not a member of a closed enum.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnumValue {
    pub field: &'static str,
    pub value: String,
}

/// A validated work item produced by the parser.
///
/// Immutable once constructed: all field constraints (lengths, positive
/// ids, enum membership) are enforced at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Client-supplied business key, unique within a submission.
    pub ticket_number: String,
    /// Short summary, at most 255 bytes.
    pub title: String,
    /// Owning customer, positive.
    pub customer_id: i64,
    /// Optional long-form description, truncated to 5000 bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: TicketPriority,
    /// Optional assignee, positive when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
}

impl TicketRecord {
    /// Create a record with required fields and defaults elsewhere.
    pub fn new(ticket_number: impl Into<String>, title: impl Into<String>, customer_id: i64) -> Self {
        Self {
            ticket_number: ticket_number.into(),
            title: title.into(),
            customer_id,
            description: None,
            status: TicketStatus::default(),
            priority: TicketPriority::default(),
            assignee_id: None,
        }
    }
}

/// View of a created ticket, as propagated on cache-consistency events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub id: i64,
    pub ticket_number: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub customer_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            "OPEN",
            "IN_PROGRESS",
            "PENDING",
            "ON_HOLD",
            "RESOLVED",
            "CLOSED",
            "REOPENED",
            "CANCELLED",
        ] {
            assert_eq!(s.parse::<TicketStatus>().unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_status_case_insensitive() {
        assert_eq!("open".parse::<TicketStatus>().unwrap(), TicketStatus::Open);
        assert_eq!(
            "  in_progress ".parse::<TicketStatus>().unwrap(),
            TicketStatus::InProgress
        );
    }

    #[test]
    fn test_status_invalid() {
        assert!("ARCHIVED".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_priority_defaults_medium() {
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
        assert_eq!(TicketStatus::default(), TicketStatus::Open);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(
            "critical".parse::<TicketPriority>().unwrap(),
            TicketPriority::Critical
        );
        assert!("URGENT".parse::<TicketPriority>().is_err());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = TicketRecord {
            ticket_number: "TKT-001".to_string(),
            title: "Login broken".to_string(),
            customer_id: 1001,
            description: Some("Cannot log in".to_string()),
            status: TicketStatus::Open,
            priority: TicketPriority::High,
            assignee_id: Some(7),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TicketRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_record_defaults_omitted_fields() {
        let json = r#"{"ticket_number":"TKT-002","title":"Reset","customer_id":5}"#;
        let record: TicketRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, TicketStatus::Open);
        assert_eq!(record.priority, TicketPriority::Medium);
        assert!(record.assignee_id.is_none());
    }
}
