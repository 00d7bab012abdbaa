//! Vendor (property partner) models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Review state of a partner application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl PartnerStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    /// Allowed review transitions
    pub const fn can_transition_to(&self, next: PartnerStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Suspended)
        )
    }
}

impl std::str::FromStr for PartnerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("unknown partner status '{}'", other)),
        }
    }
}

/// Partner from partners
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Partner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub contact_email: String,
    pub phone: String,
    pub address: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_transitions() {
        assert!(PartnerStatus::Pending.can_transition_to(PartnerStatus::Approved));
        assert!(PartnerStatus::Pending.can_transition_to(PartnerStatus::Rejected));
        assert!(PartnerStatus::Approved.can_transition_to(PartnerStatus::Suspended));
        assert!(!PartnerStatus::Rejected.can_transition_to(PartnerStatus::Approved));
        assert!(!PartnerStatus::Approved.can_transition_to(PartnerStatus::Rejected));
        assert!(!PartnerStatus::Suspended.can_transition_to(PartnerStatus::Pending));
    }
}
