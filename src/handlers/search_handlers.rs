use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    db,
    error::{ApiError, ApiResult, ValidationIssue},
    handlers::agent_handlers::owned_agent,
    handlers::api_json::ApiJson,
    handlers::auth_middleware::AuthUser,
    handlers::email_handlers::{with_actions, EmailListQuery, EmailResponse},
    models::email_models::{EmailFilters, Tier},
    models::user_models::{NewSavedEmailSearch, SavedEmailSearch},
    AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSearchRequest {
    pub name: String,
    pub agent_id: Option<i32>,
    #[serde(default)]
    pub filters: EmailFilters,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub id: i32,
    pub name: String,
    pub agent_id: Option<i32>,
    pub filters: EmailFilters,
    pub created_at: i32,
}

impl From<SavedEmailSearch> for SearchResponse {
    fn from(saved: SavedEmailSearch) -> Self {
        Self {
            id: saved.id,
            filters: serde_json::from_str(&saved.filters).unwrap_or_default(),
            name: saved.name,
            agent_id: saved.agent_id,
            created_at: saved.created_at,
        }
    }
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_searches(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> ApiResult<Json<Vec<SearchResponse>>> {
    let saved = state.search_repository.list_for_user(auth_user.user_id)?;
    Ok(Json(saved.into_iter().map(SearchResponse::from).collect()))
}

pub async fn create_search(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ApiJson(request): ApiJson<CreateSearchRequest>,
) -> ApiResult<(StatusCode, Json<SearchResponse>)> {
    let name = request.name.trim().to_string();
    let mut issues = Vec::new();
    if name.is_empty() {
        issues.push(ValidationIssue::new("name", "must not be empty"));
    }
    if let Some(tier) = request.filters.tier {
        if Tier::from_i32(tier).is_none() {
            issues.push(ValidationIssue::new("filters.tier", "must be between 1 and 4"));
        }
    }
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }
    if let Some(agent_id) = request.agent_id {
        owned_agent(&state, agent_id, auth_user.user_id)?;
    }

    let filters = serde_json::to_string(&request.filters)
        .map_err(|e| ApiError::Internal(format!("Failed to encode filters: {}", e)))?;
    let saved = state.search_repository.create(&NewSavedEmailSearch {
        user_id: auth_user.user_id,
        agent_id: request.agent_id,
        name,
        filters,
        created_at: db::now(),
    })?;
    Ok((StatusCode::CREATED, Json(saved.into())))
}

pub async fn delete_search(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(search_id): Path<i32>,
) -> ApiResult<StatusCode> {
    if !state.search_repository.delete_for_user(search_id, auth_user.user_id)? {
        return Err(ApiError::NotFound("Saved search not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Runs a saved search over one agent or, when it names none, all of the
/// caller's live agents.
pub async fn search_results(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(search_id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<EmailResponse>>> {
    let saved = state.search_repository
        .find_for_user(search_id, auth_user.user_id)?
        .ok_or_else(|| ApiError::NotFound("Saved search not found".to_string()))?;

    let agent_ids = match saved.agent_id {
        Some(agent_id) => vec![owned_agent(&state, agent_id, auth_user.user_id)?.id],
        None => state.agent_repository.live_ids_for_user(auth_user.user_id)?,
    };
    if agent_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let filters: EmailFilters = serde_json::from_str(&saved.filters).unwrap_or_default();
    let (limit, offset) = EmailListQuery {
        limit: page.limit,
        offset: page.offset,
        ..Default::default()
    }
    .page();
    let found = state.email_repository.search(&agent_ids, &filters, limit, offset)?;
    Ok(Json(with_actions(&state, found)?))
}
