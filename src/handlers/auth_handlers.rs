use std::sync::Arc;
use axum::{
    Json,
    extract::State,
};
use chrono::{Duration, Utc};
use governor::{Quota, RateLimiter};
use jsonwebtoken::{encode, EncodingKey, Header};
use nonzero_ext::nonzero;

use crate::{
    db,
    error::{ApiError, ApiResult},
    handlers::auth_dtos::{
        Claims, LoginRequest, MessageResponse, PasswordResetRequest, RegisterRequest,
        TokenRequest, TokenResponse, UserResponse, VerifyPasswordResetRequest,
    },
    handlers::auth_middleware::AuthUser,
    handlers::api_json::ApiJson,
    models::user_models::{NewUser, TokenPurpose, User},
    utils::validation::is_valid_email,
    AppState,
};

const MIN_PASSWORD_LEN: usize = 8;
const UNVERIFIED_GRACE_SECONDS: i32 = 24 * 60 * 60;

pub fn issue_access_token(user_id: i32, secret: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("Token generation failed: {}", e)))
}

fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

async fn send_verification_mail(state: &AppState, user: &User) -> ApiResult<()> {
    let token = state.token_repository.issue(
        user.id,
        TokenPurpose::EmailVerification,
        state.config.token_ttl_seconds,
    )?;
    if let Err(e) = state.mailer.send_verification(&user.email, &token).await {
        tracing::error!(user_id = user.id, "Failed to send verification email: {}", e);
    }
    Ok(())
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(reg_req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = reg_req.email.trim().to_string();
    tracing::debug!("Registration attempt for {}", email);
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }
    if reg_req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password must be 8+ characters".to_string()));
    }
    if state.user_core.email_exists(&email)? {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_password(&reg_req.password, state.config.bcrypt_cost)?;
    let now = db::now();
    let user = state.user_core.create_user(&NewUser {
        email,
        password_hash,
        name: reg_req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        verified: false,
        time_to_live: Some(now + UNVERIFIED_GRACE_SECONDS),
        created_at: now,
    })?;
    tracing::info!(user_id = user.id, "User registered");

    send_verification_mail(&state, &user).await?;

    let token = issue_access_token(user.id, &state.config.jwt_secret)?;
    Ok(Json(TokenResponse { token }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(login_req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // 5 attempts per minute per email
    let limiter_key = login_req.email.trim().to_lowercase();
    let allowed = {
        let entry = state.login_limiter
            .entry(limiter_key.clone())
            .or_insert_with(|| RateLimiter::keyed(Quota::per_minute(nonzero!(5u32))));
        entry.value().check_key(&limiter_key).is_ok()
    };
    if !allowed {
        tracing::warn!("Login rate limit exceeded");
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later".to_string()));
    }

    let user = state.user_core
        .find_by_email(login_req.email.trim())?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    match bcrypt::verify(&login_req.password, &user.password_hash) {
        Ok(true) => {
            let token = issue_access_token(user.id, &state.config.jwt_secret)?;
            Ok(Json(TokenResponse { token }))
        }
        _ => Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    }
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = state.user_core
        .find_by_id(auth_user.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        verified: user.verified,
    }))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<TokenRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = state.token_repository
        .find(req.token.trim(), TokenPurpose::EmailVerification)?
        .ok_or_else(|| ApiError::BadRequest("Invalid token".to_string()))?;

    if token.is_expired(db::now()) {
        state.token_repository.delete(token.id)?;
        tracing::debug!(user_id = token.user_id, "Expired verification token removed");
        return Err(ApiError::BadRequest("Token has expired".to_string()));
    }

    state.user_core.mark_verified(token.user_id)?;
    state.token_repository.delete(token.id)?;
    tracing::info!(user_id = token.user_id, "Email verified");
    Ok(Json(MessageResponse {
        message: "Email verified".to_string(),
    }))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    let user = state.user_core
        .find_by_id(auth_user.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if user.verified {
        return Err(ApiError::Conflict("Email already verified".to_string()));
    }
    send_verification_mail(&state, &user).await?;
    Ok(Json(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}

pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    ApiJson(reset_req): ApiJson<PasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // 3 requests per hour per email
    let limiter_key = reset_req.email.trim().to_lowercase();
    let allowed = {
        let entry = state.password_reset_limiter
            .entry(limiter_key.clone())
            .or_insert_with(|| RateLimiter::keyed(Quota::per_hour(nonzero!(3u32))));
        entry.value().check_key(&limiter_key).is_ok()
    };
    if !allowed {
        return Err(ApiError::TooManyRequests(
            "Too many password reset attempts. Please try again later.".to_string(),
        ));
    }

    // same answer whether or not the account exists
    let response = MessageResponse {
        message: "If the account exists, a reset link has been sent".to_string(),
    };

    let Some(user) = state.user_core.find_by_email(reset_req.email.trim())? else {
        return Ok(Json(response));
    };
    let token = state.token_repository.issue(
        user.id,
        TokenPurpose::PasswordReset,
        state.config.token_ttl_seconds,
    )?;
    if let Err(e) = state.mailer.send_password_reset(&user.email, &token).await {
        tracing::error!(user_id = user.id, "Failed to send password reset email: {}", e);
    }
    Ok(Json(response))
}

pub async fn verify_password_reset(
    State(state): State<Arc<AppState>>,
    ApiJson(verify_req): ApiJson<VerifyPasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let token = state.token_repository
        .find(verify_req.token.trim(), TokenPurpose::PasswordReset)?
        .ok_or_else(|| ApiError::BadRequest("Invalid token".to_string()))?;

    if token.is_expired(db::now()) {
        state.token_repository.delete(token.id)?;
        return Err(ApiError::BadRequest("Token has expired".to_string()));
    }
    if verify_req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password must be 8+ characters".to_string()));
    }

    let password_hash = hash_password(&verify_req.new_password, state.config.bcrypt_cost)?;
    state.user_core.update_password(token.user_id, &password_hash)?;
    state.token_repository.delete(token.id)?;

    if let Some(user) = state.user_core.find_by_id(token.user_id)? {
        state.login_limiter.remove(&user.email.to_lowercase());
    }
    tracing::info!(user_id = token.user_id, "Password reset completed");

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully. You can now log in with your new password.".to_string(),
    }))
}
