use std::sync::Arc;

use dashmap::DashMap;
use diesel::r2d2::{self, ConnectionManager};
use diesel::SqliteConnection;
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, RateLimiter};

pub mod config;
pub mod db;
pub mod error;
pub mod router;
pub mod schema;
pub mod handlers {
    pub mod agent_handlers;
    pub mod api_json;
    pub mod auth_dtos;
    pub mod auth_handlers;
    pub mod auth_middleware;
    pub mod email_handlers;
    pub mod integration_handlers;
    pub mod notification_handlers;
    pub mod search_handlers;
}
pub mod models {
    pub mod agent_models;
    pub mod email_models;
    pub mod user_models;
}
pub mod repositories {
    pub mod agent_repository;
    pub mod email_repository;
    pub mod search_repository;
    pub mod token_repository;
    pub mod user_core;
}
pub mod utils {
    pub mod api_key;
    pub mod mailer;
    pub mod notification_hub;
    pub mod validation;
}
pub mod jobs {
    pub mod scheduler;
}

use config::AppConfig;
use repositories::{
    agent_repository::AgentRepository, email_repository::EmailRepository,
    search_repository::SearchRepository, token_repository::TokenRepository, user_core::UserCore,
};
use utils::{mailer::Mailer, notification_hub::NotificationHub};

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

pub struct AppState {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub user_core: Arc<UserCore>,
    pub token_repository: Arc<TokenRepository>,
    pub agent_repository: Arc<AgentRepository>,
    pub email_repository: Arc<EmailRepository>,
    pub search_repository: Arc<SearchRepository>,
    pub notifications: Arc<NotificationHub>,
    pub mailer: Mailer,
    pub login_limiter: DashMap<String, KeyedLimiter>,
    pub password_reset_limiter: DashMap<String, KeyedLimiter>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: DbPool) -> Self {
        let mailer = Mailer::new(config.smtp.clone(), config.frontend_url.clone());
        Self {
            user_core: Arc::new(UserCore::new(db_pool.clone())),
            token_repository: Arc::new(TokenRepository::new(db_pool.clone())),
            agent_repository: Arc::new(AgentRepository::new(db_pool.clone())),
            email_repository: Arc::new(EmailRepository::new(db_pool.clone())),
            search_repository: Arc::new(SearchRepository::new(db_pool.clone())),
            notifications: Arc::new(NotificationHub::new()),
            mailer,
            login_limiter: DashMap::new(),
            password_reset_limiter: DashMap::new(),
            config,
            db_pool,
        }
    }
}
