use chrono::{DateTime, Utc};
use satchel_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Delivery and verification states a bag moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagStatus {
    Bagging,
    Copying,
    Copied,
    Validating,
    Validated,
    ValidationSkipped,
    Bagged,
    Packing,
    Packed,
    Depositing,
    Deposited,
    DepositSkipped,
    Failed,
    Verified,
    VerifyFailed,
}

impl BagStatus {
    pub const ALL: [BagStatus; 15] = [
        BagStatus::Bagging,
        BagStatus::Copying,
        BagStatus::Copied,
        BagStatus::Validating,
        BagStatus::Validated,
        BagStatus::ValidationSkipped,
        BagStatus::Bagged,
        BagStatus::Packing,
        BagStatus::Packed,
        BagStatus::Depositing,
        BagStatus::Deposited,
        BagStatus::DepositSkipped,
        BagStatus::Failed,
        BagStatus::Verified,
        BagStatus::VerifyFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BagStatus::Bagging => "bagging",
            BagStatus::Copying => "copying",
            BagStatus::Copied => "copied",
            BagStatus::Validating => "validating",
            BagStatus::Validated => "validated",
            BagStatus::ValidationSkipped => "validation_skipped",
            BagStatus::Bagged => "bagged",
            BagStatus::Packing => "packing",
            BagStatus::Packed => "packed",
            BagStatus::Depositing => "depositing",
            BagStatus::Deposited => "deposited",
            BagStatus::DepositSkipped => "deposit_skipped",
            BagStatus::Failed => "failed",
            BagStatus::Verified => "verified",
            BagStatus::VerifyFailed => "verify_failed",
        }
    }

    /// Whether no further event is expected for the current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BagStatus::DepositSkipped
                | BagStatus::Failed
                | BagStatus::Verified
                | BagStatus::VerifyFailed
        )
    }
}

impl fmt::Display for BagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BagStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BagStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::unknown_status(s))
    }
}

/// One append-only record in the status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Unique event ID (UUID v4)
    pub id: Uuid,

    /// String form of the bag identifier
    pub bag_identifier: String,

    pub status: BagStatus,

    /// Caller-supplied event time (UTC)
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

impl StatusEvent {
    pub fn new(
        bag_identifier: impl Into<String>,
        status: BagStatus,
        timestamp: DateTime<Utc>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bag_identifier: bag_identifier.into(),
            status,
            timestamp,
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_status() {
        for status in BagStatus::ALL {
            assert_eq!(status.as_str().parse::<BagStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "lost".parse::<BagStatus>().unwrap_err();
        assert!(matches!(err, Error::UnknownStatus { ref status } if status == "lost"));
        assert!("Deposited".parse::<BagStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<BagStatus> = BagStatus::ALL
            .into_iter()
            .filter(BagStatus::is_terminal)
            .collect();
        assert_eq!(
            terminal,
            vec![
                BagStatus::DepositSkipped,
                BagStatus::Failed,
                BagStatus::Verified,
                BagStatus::VerifyFailed,
            ]
        );
        assert!(!BagStatus::Deposited.is_terminal());
    }

    #[test]
    fn test_serde_names_match_display() {
        for status in BagStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = StatusEvent::new("rac.1", BagStatus::ValidationSkipped, Utc::now(), None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"status\":\"validation_skipped\""));
        assert!(!json.contains("note"));

        let back: StatusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
