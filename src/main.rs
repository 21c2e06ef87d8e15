use std::process;
use std::sync::Arc;

use clap::{Arg, Command};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use email_assistant::{config::AppConfig, db, jobs, router::build_router, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let matches = Command::new("email-assistant")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Email assistant backend: classifier sync, approval queue and live notifications")
        .arg(
            Arg::new("validate")
                .long("validate")
                .help("Check configuration and database, apply migrations, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on (overrides PORT)")
                .value_parser(clap::value_parser!(u16))
                .action(clap::ArgAction::Set),
        )
        .get_matches();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,email_assistant=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    let validate_only = matches.get_flag("validate");
    if let Err(e) = run(config, validate_only).await {
        tracing::error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(config: AppConfig, validate_only: bool) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url)?;
    db::run_migrations(&pool)?;
    if validate_only {
        tracing::info!("Configuration and database OK");
        return Ok(());
    }
    if !config.is_development() && config.smtp.is_none() {
        tracing::warn!("SMTP_HOST is not set, account emails will only be logged");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config, pool));

    // keep the handle alive for the lifetime of the server
    let _scheduler = jobs::scheduler::start_scheduler(state.clone()).await?;

    let app = build_router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Starting server on port {}", port);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
