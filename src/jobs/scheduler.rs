use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};

use crate::AppState;

/// Every 15 minutes, on the quarter hour.
pub const CLEANUP_SCHEDULE: &str = "0 */15 * * * *";

/// Removes expired verification/reset tokens and unverified accounts whose
/// grace period has run out. Returns `(tokens, users)` deleted.
pub fn run_cleanup(state: &AppState) -> (usize, usize) {
    let tokens = match state.token_repository.delete_expired() {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to delete expired tokens: {}", e);
            0
        }
    };
    let users = match state.user_core.delete_expired_unverified() {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to delete expired unverified users: {}", e);
            0
        }
    };
    if tokens > 0 || users > 0 {
        tracing::info!(tokens, users, "Cleanup removed expired records");
    }
    (tokens, users)
}

pub async fn start_scheduler(state: Arc<AppState>) -> anyhow::Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    let cleanup_state = state.clone();
    let cleanup_job = Job::new_async(CLEANUP_SCHEDULE, move |_, _| {
        let state = cleanup_state.clone();
        Box::pin(async move {
            let result = tokio::task::spawn_blocking(move || run_cleanup(&state)).await;
            if let Err(e) = result {
                tracing::error!("Cleanup job panicked: {}", e);
            }
        })
    })?;
    sched.add(cleanup_job).await?;

    sched.start().await?;
    tracing::info!("Scheduler started");
    Ok(sched)
}
