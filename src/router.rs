use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
    handlers::{
        agent_handlers, auth_handlers, email_handlers, integration_handlers,
        notification_handlers, search_handlers,
    },
    AppState,
};

async fn health_check() -> &'static str {
    "OK"
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!("FRONTEND_URL is not a valid origin, cross-origin requests are disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(origin)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .allow_credentials(true)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/register", post(auth_handlers::register))
        .route("/api/login", post(auth_handlers::login))
        .route("/api/auth/verify-email", post(auth_handlers::verify_email))
        .route("/api/password-reset/request", post(auth_handlers::request_password_reset))
        .route("/api/password-reset/verify", post(auth_handlers::verify_password_reset));

    // X-API-Key
    let integration_routes = Router::new()
        .route(
            "/api/integration/sync",
            post(integration_handlers::sync_emails).get(integration_handlers::sync_status),
        )
        .route("/api/notifications/broadcast", post(notification_handlers::broadcast))
        .route("/api/notifications/stream", get(notification_handlers::stream_notifications));

    // JWT bearer
    let protected_routes = Router::new()
        .route("/api/profile", get(auth_handlers::get_profile))
        .route("/api/auth/verify-email/resend", post(auth_handlers::resend_verification))
        .route("/api/agents", get(agent_handlers::list_agents).post(agent_handlers::create_agent))
        .route(
            "/api/agents/{id}",
            get(agent_handlers::get_agent)
                .put(agent_handlers::update_agent)
                .delete(agent_handlers::delete_agent),
        )
        .route("/api/agents/{id}/versions", get(agent_handlers::list_versions))
        .route("/api/agents/{id}/approvals", get(email_handlers::list_approvals))
        .route("/api/agents/{id}/emails", get(email_handlers::list_emails))
        .route("/api/emails/{id}", get(email_handlers::get_email))
        .route("/api/emails/{id}/approve", post(email_handlers::approve_email))
        .route("/api/emails/{id}/reject", post(email_handlers::reject_email))
        .route("/api/emails/{id}/draft", put(email_handlers::update_draft))
        .route("/api/emails/{id}/flag", post(email_handlers::flag_email))
        .route("/api/searches", get(search_handlers::list_searches).post(search_handlers::create_search))
        .route("/api/searches/{id}", axum::routing::delete(search_handlers::delete_search))
        .route("/api/searches/{id}/results", get(search_handlers::search_results));

    Router::new()
        .merge(public_routes)
        .merge(integration_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.frontend_url))
        .with_state(state)
}
