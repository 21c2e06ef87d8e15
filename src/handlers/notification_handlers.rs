use std::{convert::Infallible, sync::Arc, time::Duration};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::ApiResult,
    handlers::api_json::ApiJson,
    handlers::auth_middleware::{IntegrationClient, StreamCaller},
    AppState,
};

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Serialize)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

pub async fn stream_notifications(
    State(state): State<Arc<AppState>>,
    caller: StreamCaller,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscription, rx) = state.notifications.subscribe();
    match caller {
        StreamCaller::Integration => {
            tracing::info!(connection = %subscription.id(), "Integration client opened notification stream")
        }
        StreamCaller::User(user_id) => {
            tracing::info!(connection = %subscription.id(), user_id, "User opened notification stream")
        }
    }

    // the subscription lives inside the stream state, so it is dropped
    // (and unregistered) when axum drops the body on disconnect
    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let data = rx.recv().await?;
        Some((Ok(Event::default().data(data)), (rx, subscription)))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    )
}

pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    _client: IntegrationClient,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<Json<BroadcastResponse>> {
    let delivered = state.notifications.broadcast(&payload);
    tracing::info!(delivered, "Relayed external notification");
    Ok(Json(BroadcastResponse { delivered }))
}
