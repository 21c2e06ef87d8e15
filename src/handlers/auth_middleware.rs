use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::ApiError,
    handlers::auth_dtos::Claims,
    utils::api_key::api_key_matches,
    AppState,
};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Dashboard user authenticated with a bearer JWT.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub user_id: i32,
}

/// Caller holding the integration API key (the external classifier).
#[derive(Clone, Copy, Debug)]
pub struct IntegrationClient;

/// Who opened a notification stream.
#[derive(Clone, Copy, Debug)]
pub enum StreamCaller {
    Integration,
    User(i32),
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

fn presented_api_key(parts: &Parts, allow_query: bool) -> Option<String> {
    if let Some(key) = parts
        .headers
        .get(API_KEY_HEADER)
        .and_then(|header| header.to_str().ok())
    {
        return Some(key.to_string());
    }
    if !allow_query {
        return None;
    }
    // EventSource cannot set headers, so streams may pass the key in the query
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .find(|(name, _)| name == "api_key")
        .map(|(_, value)| value)
}

pub fn decode_user_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("No authorization token provided".to_string()))?;
        let claims = decode_user_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser { user_id: claims.sub })
    }
}

impl FromRequestParts<Arc<AppState>> for IntegrationClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = presented_api_key(parts, false)
            .ok_or_else(|| ApiError::Unauthorized("Missing API key".to_string()))?;
        if !api_key_matches(&key, &state.config.integration_api_key) {
            debug!("Rejected integration call with invalid API key");
            return Err(ApiError::Unauthorized("Invalid API key".to_string()));
        }
        Ok(IntegrationClient)
    }
}

impl FromRequestParts<Arc<AppState>> for StreamCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = presented_api_key(parts, true) {
            if api_key_matches(&key, &state.config.integration_api_key) {
                return Ok(StreamCaller::Integration);
            }
            return Err(ApiError::Unauthorized("Invalid API key".to_string()));
        }
        if let Some(token) = bearer_token(parts) {
            let claims = decode_user_token(token, &state.config.jwt_secret)?;
            return Ok(StreamCaller::User(claims.sub));
        }
        Err(ApiError::Unauthorized("Missing API key".to_string()))
    }
}
