use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub integration_api_key: String,
    pub environment: String,
    pub port: u16,
    pub frontend_url: String,
    pub token_ttl_seconds: i32,
    pub bcrypt_cost: u32,
    pub smtp: Option<SmtpConfig>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parsed("SMTP_PORT", 587u16)?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from: required("MAIL_FROM")?,
            }),
            _ => None,
        };

        let token_ttl_seconds = parsed("TOKEN_TTL_SECONDS", 3600i32)?;
        if token_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_SECONDS",
                value: token_ttl_seconds.to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET_KEY")?,
            integration_api_key: required("INTEGRATION_API_KEY")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()),
            port: parsed("PORT", 3000u16)?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            token_ttl_seconds,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            smtp,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
