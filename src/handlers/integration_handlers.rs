use std::sync::Arc;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db,
    error::{ApiError, ApiResult, ValidationIssue},
    handlers::agent_handlers::AgentResponse,
    handlers::api_json::ApiJson,
    handlers::auth_middleware::IntegrationClient,
    models::email_models::{EmailStatus, NewEmail, Tier},
    repositories::email_repository::{ActionDraft, EmailCounts},
    utils::validation::parse_timestamp,
    AppState,
};

pub const MAX_EMAILS_PER_SYNC: usize = 500;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub agent_email: String,
    pub emails: Vec<SyncEmail>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncEmail {
    pub gmail_id: String,
    pub thread_id: Option<String>,
    pub from: String,
    pub subject: Option<String>,
    pub snippet: Option<String>,
    pub received_at: Option<Value>,
    pub tier: i64,
    pub status: Option<EmailStatus>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
    pub draft_response: Option<String>,
    pub actions: Option<Vec<SyncAction>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub agent_id: i32,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub actions_created: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusQuery {
    pub agent_email: Option<String>,
}

#[derive(Serialize)]
pub struct SyncStatusResponse {
    pub agent: AgentResponse,
    pub counts: EmailCounts,
}

impl SyncRequest {
    /// Checks what the type system cannot: ranges, required text, limits.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.agent_email.trim().is_empty() {
            issues.push(ValidationIssue::new("agentEmail", "must not be empty"));
        }
        if self.emails.len() > MAX_EMAILS_PER_SYNC {
            issues.push(ValidationIssue::new(
                "emails",
                format!("at most {} emails per request", MAX_EMAILS_PER_SYNC),
            ));
            return issues;
        }
        for (i, email) in self.emails.iter().enumerate() {
            let at = |field: &str| format!("emails[{}].{}", i, field);
            if email.gmail_id.trim().is_empty() {
                issues.push(ValidationIssue::new(at("gmailId"), "must not be empty"));
            }
            if email.from.trim().is_empty() {
                issues.push(ValidationIssue::new(at("from"), "must not be empty"));
            }
            if i32::try_from(email.tier).ok().and_then(Tier::from_i32).is_none() {
                issues.push(ValidationIssue::new(at("tier"), "must be between 1 and 4"));
            }
            if let Some(confidence) = email.confidence {
                if !(0.0..=1.0).contains(&confidence) {
                    issues.push(ValidationIssue::new(at("confidence"), "must be between 0 and 1"));
                }
            }
            if let Some(received_at) = &email.received_at {
                if parse_timestamp(received_at).is_none() {
                    issues.push(ValidationIssue::new(
                        at("receivedAt"),
                        "must be an RFC 3339 date or unix seconds",
                    ));
                }
            }
            for (j, action) in email.actions.iter().flatten().enumerate() {
                if action.action_type.trim().is_empty() {
                    issues.push(ValidationIssue::new(
                        format!("emails[{}].actions[{}].type", i, j),
                        "must not be empty",
                    ));
                }
            }
        }
        issues
    }
}

impl SyncEmail {
    /// Expects a validated item.
    fn into_records(self, agent_id: i32, now: i32) -> (NewEmail, Option<Vec<ActionDraft>>) {
        let tier = i32::try_from(self.tier)
            .ok()
            .and_then(Tier::from_i32)
            .unwrap_or(Tier::Escalate);
        let status = self.status.unwrap_or_else(|| tier.default_status());
        let received_at = self
            .received_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let actions = self.actions.map(|list| {
            list.into_iter()
                .map(|action| ActionDraft {
                    action_type: action.action_type.trim().to_string(),
                    payload: match action.payload {
                        Value::Null => json!({}),
                        payload => payload,
                    }
                    .to_string(),
                    requires_approval: action.requires_approval,
                })
                .collect()
        });
        let email = NewEmail {
            agent_id,
            gmail_id: self.gmail_id.trim().to_string(),
            thread_id: self.thread_id,
            from_address: self.from.trim().to_string(),
            subject: self.subject.unwrap_or_default(),
            snippet: self.snippet,
            received_at,
            tier: tier.as_i32(),
            status: status.as_str().to_string(),
            reasoning: self.reasoning.unwrap_or_default(),
            confidence: self.confidence.map(|c| c as f32),
            draft_response: self.draft_response,
            created_at: now,
            updated_at: now,
        };
        (email, actions)
    }
}

pub async fn sync_emails(
    State(state): State<Arc<AppState>>,
    _client: IntegrationClient,
    ApiJson(request): ApiJson<SyncRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let issues = request.validate();
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }

    let agent = state.agent_repository
        .find_live_by_email(&request.agent_email)?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    tracing::info!(agent_id = agent.id, emails = request.emails.len(), "Sync started");

    let now = db::now();
    let mut response = SyncResponse {
        success: true,
        agent_id: agent.id,
        processed: 0,
        created: 0,
        updated: 0,
        actions_created: 0,
    };
    let mut attention = Vec::new();

    for item in request.emails {
        let (new_email, actions) = item.into_records(agent.id, now);
        let outcome = state.email_repository.upsert_email(&new_email, actions.as_deref())?;

        response.processed += 1;
        if outcome.created {
            response.created += 1;
        } else {
            response.updated += 1;
        }
        response.actions_created += outcome.actions_created;

        let email = &outcome.email;
        let kind = match email.status.parse::<EmailStatus>() {
            Ok(EmailStatus::PendingApproval) if email.tier == Tier::Draft.as_i32() => {
                Some("email_pending_approval")
            }
            Ok(EmailStatus::Escalated) => Some("email_escalated"),
            _ => None,
        };
        if let Some(kind) = kind {
            if outcome.previous_status.as_deref() != Some(email.status.as_str()) {
                attention.push((kind, json!({
                    "agentId": agent.id,
                    "emailId": email.id,
                    "gmailId": email.gmail_id,
                    "from": email.from_address,
                    "subject": email.subject,
                    "tier": email.tier,
                })));
            }
        }
        tracing::debug!(
            agent_id = agent.id,
            gmail_id = %email.gmail_id,
            created = outcome.created,
            "Email synced"
        );
    }

    let last_run_at = state.agent_repository.touch_last_run(agent.id)?;

    for (kind, fields) in attention {
        state.notifications.notify(kind, fields);
    }
    state.notifications.notify(
        "sync_completed",
        json!({
            "agentId": agent.id,
            "agentEmail": agent.email,
            "processed": response.processed,
            "created": response.created,
            "updated": response.updated,
            "lastRunAt": last_run_at,
        }),
    );
    tracing::info!(
        agent_id = agent.id,
        processed = response.processed,
        created = response.created,
        updated = response.updated,
        "Sync completed"
    );
    Ok(Json(response))
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
    _client: IntegrationClient,
    Query(query): Query<SyncStatusQuery>,
) -> ApiResult<Json<SyncStatusResponse>> {
    let agent_email = query
        .agent_email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("agentEmail query parameter is required".to_string()))?;
    let agent = state.agent_repository
        .find_live_by_email(&agent_email)?
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;
    let counts = state.email_repository.counts(agent.id)?;
    Ok(Json(SyncStatusResponse {
        agent: agent.into(),
        counts,
    }))
}
