use diesel::prelude::*;
use serde::Serialize;
use crate::schema::agents;
use crate::schema::agent_versions;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = agents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Agent {
    pub id: i32,
    pub user_id: i32, // owner
    pub name: String,
    pub email: String, // the mailbox this agent works on
    pub timezone: String,
    pub business_hours_start: String, // "HH:MM"
    pub business_hours_end: String,
    pub communication_style: Option<String>,
    pub off_limits_contacts: String, // json array of addresses the agent must never act on
    pub is_active: bool,
    pub last_run_at: Option<i32>, // last sync from the classifier
    pub created_at: i32,
    pub updated_at: i32,
    pub deleted_at: Option<i32>,
}

impl Agent {
    pub fn off_limits(&self) -> Vec<String> {
        serde_json::from_str(&self.off_limits_contacts).unwrap_or_default()
    }

    /// Snapshot of the user-editable configuration, stored with every version.
    pub fn config_snapshot(&self) -> AgentConfig {
        AgentConfig {
            name: self.name.clone(),
            email: self.email.clone(),
            timezone: self.timezone.clone(),
            business_hours_start: self.business_hours_start.clone(),
            business_hours_end: self.business_hours_end.clone(),
            communication_style: self.communication_style.clone(),
            off_limits_contacts: self.off_limits(),
            is_active: self.is_active,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub name: String,
    pub email: String,
    pub timezone: String,
    pub business_hours_start: String,
    pub business_hours_end: String,
    pub communication_style: Option<String>,
    pub off_limits_contacts: Vec<String>,
    pub is_active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = agents)]
pub struct NewAgent {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub timezone: String,
    pub business_hours_start: String,
    pub business_hours_end: String,
    pub communication_style: Option<String>,
    pub off_limits_contacts: String,
    pub is_active: bool,
    pub created_at: i32,
    pub updated_at: i32,
}

/// Partial update; `None` leaves the column untouched.
#[derive(AsChangeset, Default)]
#[diesel(table_name = agents)]
pub struct AgentChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
    pub business_hours_start: Option<String>,
    pub business_hours_end: Option<String>,
    pub communication_style: Option<Option<String>>,
    pub off_limits_contacts: Option<String>,
    pub is_active: Option<bool>,
    pub updated_at: Option<i32>,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = agent_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AgentVersion {
    pub id: i32,
    pub agent_id: i32,
    pub version: i32,
    pub config: String, // json AgentConfig
    pub created_by: i32,
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = agent_versions)]
pub struct NewAgentVersion {
    pub agent_id: i32,
    pub version: i32,
    pub config: String,
    pub created_by: i32,
    pub created_at: i32,
}
