use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    db,
    error::{ApiError, ApiResult, DbError, ValidationIssue},
    handlers::auth_middleware::AuthUser,
    handlers::api_json::ApiJson,
    models::agent_models::{Agent, AgentChanges, AgentVersion, NewAgent},
    repositories::email_repository::EmailCounts,
    utils::validation::{is_valid_email, is_valid_timezone, parse_clock},
    AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub email: String,
    pub timezone: Option<String>,
    pub business_hours_start: Option<String>,
    pub business_hours_end: Option<String>,
    pub communication_style: Option<String>,
    #[serde(default)]
    pub off_limits_contacts: Vec<String>,
    pub is_active: Option<bool>,
}

/// Every field optional; an empty `communicationStyle` clears it.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub timezone: Option<String>,
    pub business_hours_start: Option<String>,
    pub business_hours_end: Option<String>,
    pub communication_style: Option<String>,
    pub off_limits_contacts: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub timezone: String,
    pub business_hours_start: String,
    pub business_hours_end: String,
    pub communication_style: Option<String>,
    pub off_limits_contacts: Vec<String>,
    pub is_active: bool,
    pub last_run_at: Option<i32>,
    pub created_at: i32,
    pub updated_at: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<EmailCounts>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        let off_limits_contacts = agent.off_limits();
        Self {
            id: agent.id,
            name: agent.name,
            email: agent.email,
            timezone: agent.timezone,
            business_hours_start: agent.business_hours_start,
            business_hours_end: agent.business_hours_end,
            communication_style: agent.communication_style,
            off_limits_contacts,
            is_active: agent.is_active,
            last_run_at: agent.last_run_at,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
            counts: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentVersionResponse {
    pub version: i32,
    pub config: serde_json::Value,
    pub created_by: i32,
    pub created_at: i32,
}

impl From<AgentVersion> for AgentVersionResponse {
    fn from(version: AgentVersion) -> Self {
        Self {
            version: version.version,
            config: serde_json::from_str(&version.config).unwrap_or(serde_json::Value::Null),
            created_by: version.created_by,
            created_at: version.created_at,
        }
    }
}

/// The agent, if it exists, is live, and belongs to the caller.
pub fn owned_agent(state: &AppState, agent_id: i32, user_id: i32) -> ApiResult<Agent> {
    state.agent_repository
        .find_for_user(agent_id, user_id)?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))
}

fn mailbox_taken(e: DbError) -> ApiError {
    if e.is_unique_violation() {
        ApiError::Conflict("Another agent already uses this mailbox".to_string())
    } else {
        e.into()
    }
}

fn normalize_contacts(contacts: &[String], issues: &mut Vec<ValidationIssue>) -> String {
    let mut cleaned: Vec<String> = Vec::with_capacity(contacts.len());
    for (i, contact) in contacts.iter().enumerate() {
        let contact = contact.trim().to_lowercase();
        if contact.is_empty() {
            issues.push(ValidationIssue::new(format!("offLimitsContacts[{}]", i), "must not be empty"));
        } else if !cleaned.contains(&contact) {
            cleaned.push(contact);
        }
    }
    serde_json::to_string(&cleaned).unwrap_or_else(|_| "[]".to_string())
}

fn check_hours(start: &str, end: &str, issues: &mut Vec<ValidationIssue>) {
    match (parse_clock(start), parse_clock(end)) {
        (Some(s), Some(e)) if s < e => {}
        (Some(_), Some(_)) => issues.push(ValidationIssue::new(
            "businessHoursEnd",
            "must be later than businessHoursStart",
        )),
        (start_parsed, end_parsed) => {
            if start_parsed.is_none() {
                issues.push(ValidationIssue::new("businessHoursStart", "must be HH:MM"));
            }
            if end_parsed.is_none() {
                issues.push(ValidationIssue::new("businessHoursEnd", "must be HH:MM"));
            }
        }
    }
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> ApiResult<Json<Vec<AgentResponse>>> {
    let agents = state.agent_repository.list_for_user(auth_user.user_id)?;
    Ok(Json(agents.into_iter().map(AgentResponse::from).collect()))
}

pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<AgentResponse>)> {
    let mut issues = Vec::new();
    let name = request.name.trim().to_string();
    if name.is_empty() {
        issues.push(ValidationIssue::new("name", "must not be empty"));
    }
    let email = request.email.trim().to_string();
    if !is_valid_email(&email) {
        issues.push(ValidationIssue::new("email", "must be a valid email address"));
    }
    let timezone = request.timezone.unwrap_or_else(|| "UTC".to_string());
    if !is_valid_timezone(&timezone) {
        issues.push(ValidationIssue::new("timezone", "unknown timezone"));
    }
    let start = request.business_hours_start.unwrap_or_else(|| "09:00".to_string());
    let end = request.business_hours_end.unwrap_or_else(|| "17:00".to_string());
    check_hours(&start, &end, &mut issues);
    let off_limits_contacts = normalize_contacts(&request.off_limits_contacts, &mut issues);
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }

    let now = db::now();
    let agent = state.agent_repository
        .create_agent(&NewAgent {
            user_id: auth_user.user_id,
            name,
            email,
            timezone,
            business_hours_start: start,
            business_hours_end: end,
            communication_style: request.communication_style.filter(|s| !s.trim().is_empty()),
            off_limits_contacts,
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
        .map_err(mailbox_taken)?;
    tracing::info!(agent_id = agent.id, user_id = auth_user.user_id, "Agent created");
    Ok((StatusCode::CREATED, Json(agent.into())))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
) -> ApiResult<Json<AgentResponse>> {
    let agent = owned_agent(&state, agent_id, auth_user.user_id)?;
    let counts = state.email_repository.counts(agent.id)?;
    let mut response = AgentResponse::from(agent);
    response.counts = Some(counts);
    Ok(Json(response))
}

pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
    ApiJson(request): ApiJson<UpdateAgentRequest>,
) -> ApiResult<Json<AgentResponse>> {
    let current = owned_agent(&state, agent_id, auth_user.user_id)?;
    let mut issues = Vec::new();
    let mut changes = AgentChanges::default();

    if let Some(name) = request.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            issues.push(ValidationIssue::new("name", "must not be empty"));
        }
        changes.name = Some(name);
    }
    if let Some(email) = request.email {
        let email = email.trim().to_string();
        if !is_valid_email(&email) {
            issues.push(ValidationIssue::new("email", "must be a valid email address"));
        }
        changes.email = Some(email);
    }
    if let Some(timezone) = request.timezone {
        if !is_valid_timezone(&timezone) {
            issues.push(ValidationIssue::new("timezone", "unknown timezone"));
        }
        changes.timezone = Some(timezone);
    }
    if request.business_hours_start.is_some() || request.business_hours_end.is_some() {
        let start = request.business_hours_start.unwrap_or(current.business_hours_start.clone());
        let end = request.business_hours_end.unwrap_or(current.business_hours_end.clone());
        check_hours(&start, &end, &mut issues);
        changes.business_hours_start = Some(start);
        changes.business_hours_end = Some(end);
    }
    if let Some(style) = request.communication_style {
        let style = style.trim().to_string();
        changes.communication_style = Some(if style.is_empty() { None } else { Some(style) });
    }
    if let Some(contacts) = request.off_limits_contacts {
        changes.off_limits_contacts = Some(normalize_contacts(&contacts, &mut issues));
    }
    changes.is_active = request.is_active;
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }
    changes.updated_at = Some(db::now());

    let agent = state.agent_repository
        .update_agent(current.id, &changes, auth_user.user_id)
        .map_err(mailbox_taken)?;
    tracing::info!(agent_id = agent.id, "Agent updated");
    Ok(Json(agent.into()))
}

pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let agent = owned_agent(&state, agent_id, auth_user.user_id)?;
    state.agent_repository.soft_delete(agent.id)?;
    tracing::info!(agent_id = agent.id, "Agent soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
) -> ApiResult<Json<Vec<AgentVersionResponse>>> {
    let agent = owned_agent(&state, agent_id, auth_user.user_id)?;
    let versions = state.agent_repository.list_versions(agent.id)?;
    Ok(Json(versions.into_iter().map(AgentVersionResponse::from).collect()))
}
