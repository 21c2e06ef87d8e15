use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::emails;
use crate::schema::agent_actions;

/// Handling class assigned by the classifier. Lower is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Escalate = 1, // owner has to deal with it personally
    Draft = 2,    // a reply was drafted and waits for approval
    Auto = 3,     // handled without review
    Archive = 4,  // no action needed
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Escalate, Tier::Draft, Tier::Auto, Tier::Archive];

    pub fn from_i32(value: i32) -> Option<Tier> {
        match value {
            1 => Some(Tier::Escalate),
            2 => Some(Tier::Draft),
            3 => Some(Tier::Auto),
            4 => Some(Tier::Archive),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Status an email lands in when the classifier does not say otherwise.
    pub fn default_status(self) -> EmailStatus {
        match self {
            Tier::Escalate => EmailStatus::Escalated,
            Tier::Draft => EmailStatus::PendingApproval,
            Tier::Auto | Tier::Archive => EmailStatus::Processed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Processed,
    PendingApproval,
    Escalated,
    Flagged,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Processed => "processed",
            EmailStatus::PendingApproval => "pending_approval",
            EmailStatus::Escalated => "escalated",
            EmailStatus::Flagged => "flagged",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(EmailStatus::Processed),
            "pending_approval" => Ok(EmailStatus::PendingApproval),
            "escalated" => Ok(EmailStatus::Escalated),
            "flagged" => Ok(EmailStatus::Flagged),
            other => Err(format!("unknown email status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = emails)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Email {
    pub id: i32,
    pub agent_id: i32,
    pub gmail_id: String, // provider message id, unique per agent
    pub thread_id: Option<String>,
    pub from_address: String,
    pub subject: String,
    pub snippet: Option<String>,
    pub received_at: i32,
    pub tier: i32, // 1-4, see Tier
    pub status: String, // see EmailStatus
    pub reasoning: String,
    pub confidence: Option<f32>,
    pub draft_response: Option<String>,
    pub reviewed_at: Option<i32>,
    pub created_at: i32,
    pub updated_at: i32,
}

impl Email {
    pub fn is_pending(&self) -> bool {
        self.status == EmailStatus::PendingApproval.as_str()
    }

    /// The owner has approved, rejected or flagged it.
    pub fn is_decided(&self) -> bool {
        self.reviewed_at.is_some()
    }
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = emails)]
pub struct NewEmail {
    pub agent_id: i32,
    pub gmail_id: String,
    pub thread_id: Option<String>,
    pub from_address: String,
    pub subject: String,
    pub snippet: Option<String>,
    pub received_at: i32,
    pub tier: i32,
    pub status: String,
    pub reasoning: String,
    pub confidence: Option<f32>,
    pub draft_response: Option<String>,
    pub created_at: i32,
    pub updated_at: i32,
}

/// Columns a re-sync overwrites on an email that is already stored.
#[derive(AsChangeset, Clone, Debug)]
#[diesel(table_name = emails)]
#[diesel(treat_none_as_null = true)]
pub struct EmailClassification {
    pub thread_id: Option<String>,
    pub from_address: String,
    pub subject: String,
    pub snippet: Option<String>,
    pub received_at: i32,
    pub tier: i32,
    pub status: String,
    pub reasoning: String,
    pub confidence: Option<f32>,
    pub draft_response: Option<String>,
    pub updated_at: i32,
}

impl From<&NewEmail> for EmailClassification {
    fn from(email: &NewEmail) -> Self {
        Self {
            thread_id: email.thread_id.clone(),
            from_address: email.from_address.clone(),
            subject: email.subject.clone(),
            snippet: email.snippet.clone(),
            received_at: email.received_at,
            tier: email.tier,
            status: email.status.clone(),
            reasoning: email.reasoning.clone(),
            confidence: email.confidence,
            draft_response: email.draft_response.clone(),
            updated_at: email.updated_at,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Associations, Clone, Debug)]
#[diesel(belongs_to(Email))]
#[diesel(table_name = agent_actions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AgentAction {
    pub id: i32,
    pub agent_id: i32,
    pub email_id: i32,
    pub action_type: String, // send_draft, create_task, ...
    pub payload: String, // opaque json
    pub requires_approval: bool,
    pub status: String, // see ActionStatus
    pub created_at: i32,
    pub updated_at: i32,
}

/// Filters shared by the email list endpoint and saved searches.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct EmailFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EmailStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = agent_actions)]
pub struct NewAgentAction {
    pub agent_id: i32,
    pub email_id: i32,
    pub action_type: String,
    pub payload: String,
    pub requires_approval: bool,
    pub status: String,
    pub created_at: i32,
    pub updated_at: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_round_trip_through_their_ordinal() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_i32(tier.as_i32()), Some(tier));
        }
        assert_eq!(Tier::from_i32(0), None);
        assert_eq!(Tier::from_i32(5), None);
    }

    #[test]
    fn draft_tier_waits_for_approval_by_default() {
        assert_eq!(Tier::Escalate.default_status(), EmailStatus::Escalated);
        assert_eq!(Tier::Draft.default_status(), EmailStatus::PendingApproval);
        assert_eq!(Tier::Auto.default_status(), EmailStatus::Processed);
        assert_eq!(Tier::Archive.default_status(), EmailStatus::Processed);
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("pending_approval".parse::<EmailStatus>(), Ok(EmailStatus::PendingApproval));
        assert!("pending".parse::<EmailStatus>().is_err());
        let json = serde_json::to_string(&EmailStatus::Flagged).unwrap();
        assert_eq!(json, "\"flagged\"");
    }
}
