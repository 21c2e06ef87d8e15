use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult, ValidationIssue},
    handlers::agent_handlers::owned_agent,
    handlers::api_json::ApiJson,
    handlers::auth_middleware::AuthUser,
    models::email_models::{AgentAction, Email, EmailFilters, EmailStatus, Tier},
    repositories::email_repository::Decision,
    AppState,
};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub id: i32,
    #[serde(rename = "type")]
    pub action_type: String,
    pub payload: Value,
    pub requires_approval: bool,
    pub status: String,
    pub created_at: i32,
    pub updated_at: i32,
}

impl From<AgentAction> for ActionResponse {
    fn from(action: AgentAction) -> Self {
        Self {
            id: action.id,
            payload: serde_json::from_str(&action.payload).unwrap_or(Value::Null),
            action_type: action.action_type,
            requires_approval: action.requires_approval,
            status: action.status,
            created_at: action.created_at,
            updated_at: action.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResponse {
    pub id: i32,
    pub agent_id: i32,
    pub gmail_id: String,
    pub thread_id: Option<String>,
    pub from: String,
    pub subject: String,
    pub snippet: Option<String>,
    pub received_at: i32,
    pub tier: i32,
    pub status: String,
    pub reasoning: String,
    pub confidence: Option<f32>,
    pub draft_response: Option<String>,
    pub reviewed_at: Option<i32>,
    pub created_at: i32,
    pub updated_at: i32,
    pub actions: Vec<ActionResponse>,
}

impl EmailResponse {
    pub fn new(email: Email, actions: Vec<AgentAction>) -> Self {
        Self {
            id: email.id,
            agent_id: email.agent_id,
            gmail_id: email.gmail_id,
            thread_id: email.thread_id,
            from: email.from_address,
            subject: email.subject,
            snippet: email.snippet,
            received_at: email.received_at,
            tier: email.tier,
            status: email.status,
            reasoning: email.reasoning,
            confidence: email.confidence,
            draft_response: email.draft_response,
            reviewed_at: email.reviewed_at,
            created_at: email.created_at,
            updated_at: email.updated_at,
            actions: actions.into_iter().map(ActionResponse::from).collect(),
        }
    }
}

/// Loads the actions for a page of emails and pairs them up.
pub fn with_actions(state: &AppState, list: Vec<Email>) -> ApiResult<Vec<EmailResponse>> {
    let grouped = state.email_repository.actions_for(&list)?;
    Ok(list
        .into_iter()
        .zip(grouped)
        .map(|(email, actions)| EmailResponse::new(email, actions))
        .collect())
}

#[derive(Deserialize, Default)]
pub struct EmailListQuery {
    pub tier: Option<i32>,
    pub status: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EmailListQuery {
    pub fn filters(&self) -> ApiResult<EmailFilters> {
        let mut issues = Vec::new();
        if let Some(tier) = self.tier {
            if Tier::from_i32(tier).is_none() {
                issues.push(ValidationIssue::new("tier", "must be between 1 and 4"));
            }
        }
        let status = match self.status.as_deref() {
            Some(raw) => match raw.parse::<EmailStatus>() {
                Ok(status) => Some(status),
                Err(e) => {
                    issues.push(ValidationIssue::new("status", e));
                    None
                }
            },
            None => None,
        };
        if !issues.is_empty() {
            return Err(ApiError::Validation(issues));
        }
        Ok(EmailFilters {
            tier: self.tier,
            status,
            q: self.q.clone(),
        })
    }

    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub draft_response: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    pub draft_response: String,
}

#[derive(Deserialize, Default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

fn owned_email(state: &AppState, email_id: i32, user_id: i32) -> ApiResult<Email> {
    state.email_repository
        .find_for_user(email_id, user_id)?
        .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))
}

fn not_pending() -> ApiError {
    ApiError::Conflict("Email is not pending approval".to_string())
}

fn single(state: &AppState, email: Email) -> ApiResult<Json<EmailResponse>> {
    let mut list = with_actions(state, vec![email])?;
    list.pop()
        .map(Json)
        .ok_or_else(|| ApiError::Internal("Email vanished while loading actions".to_string()))
}

pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
) -> ApiResult<Json<Vec<EmailResponse>>> {
    let agent = owned_agent(&state, agent_id, auth_user.user_id)?;
    let queue = state.email_repository.approval_queue(agent.id)?;
    Ok(Json(with_actions(&state, queue)?))
}

pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(agent_id): Path<i32>,
    Query(query): Query<EmailListQuery>,
) -> ApiResult<Json<Vec<EmailResponse>>> {
    let agent = owned_agent(&state, agent_id, auth_user.user_id)?;
    let filters = query.filters()?;
    let (limit, offset) = query.page();
    let found = state.email_repository.search(&[agent.id], &filters, limit, offset)?;
    Ok(Json(with_actions(&state, found)?))
}

pub async fn get_email(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(email_id): Path<i32>,
) -> ApiResult<Json<EmailResponse>> {
    let email = owned_email(&state, email_id, auth_user.user_id)?;
    single(&state, email)
}

pub async fn approve_email(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(email_id): Path<i32>,
    body: Option<ApiJson<ApproveRequest>>,
) -> ApiResult<Json<EmailResponse>> {
    let email = owned_email(&state, email_id, auth_user.user_id)?;
    if !email.is_pending() {
        return Err(not_pending());
    }
    let draft_response = body
        .and_then(|ApiJson(req)| req.draft_response)
        .filter(|draft| !draft.trim().is_empty());
    let email = state.email_repository
        .decide(email.id, &Decision::Approve { draft_response })?
        .ok_or_else(not_pending)?;

    tracing::info!(email_id = email.id, agent_id = email.agent_id, "Email approved");
    state.notifications.notify(
        "email_approved",
        json!({"agentId": email.agent_id, "emailId": email.id, "gmailId": email.gmail_id}),
    );
    single(&state, email)
}

pub async fn reject_email(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(email_id): Path<i32>,
    body: Option<ApiJson<RejectRequest>>,
) -> ApiResult<Json<EmailResponse>> {
    let email = owned_email(&state, email_id, auth_user.user_id)?;
    if !email.is_pending() {
        return Err(not_pending());
    }
    let reason = body.and_then(|ApiJson(req)| req.reason);
    let email = state.email_repository
        .decide(email.id, &Decision::Reject { reason: reason.clone() })?
        .ok_or_else(not_pending)?;

    tracing::info!(email_id = email.id, agent_id = email.agent_id, "Email rejected");
    state.notifications.notify(
        "email_rejected",
        json!({"agentId": email.agent_id, "emailId": email.id, "gmailId": email.gmail_id, "reason": reason}),
    );
    single(&state, email)
}

pub async fn update_draft(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(email_id): Path<i32>,
    ApiJson(request): ApiJson<DraftRequest>,
) -> ApiResult<Json<EmailResponse>> {
    let email = owned_email(&state, email_id, auth_user.user_id)?;
    if !email.is_pending() {
        return Err(not_pending());
    }
    if request.draft_response.trim().is_empty() {
        return Err(ApiError::Validation(vec![ValidationIssue::new(
            "draftResponse",
            "must not be empty",
        )]));
    }
    let email = state.email_repository
        .update_draft(email.id, &request.draft_response)?
        .ok_or_else(not_pending)?;

    state.notifications.notify(
        "draft_updated",
        json!({"agentId": email.agent_id, "emailId": email.id, "gmailId": email.gmail_id}),
    );
    single(&state, email)
}

pub async fn flag_email(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(email_id): Path<i32>,
) -> ApiResult<Json<EmailResponse>> {
    let email = owned_email(&state, email_id, auth_user.user_id)?;
    let email = state.email_repository.flag(email.id)?;
    tracing::info!(email_id = email.id, "Email flagged");
    state.notifications.notify(
        "email_flagged",
        json!({"agentId": email.agent_id, "emailId": email.id, "gmailId": email.gmail_id}),
    );
    single(&state, email)
}
