use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error};

use hush_types::api::{
    Anchor, Claims, MessageResponse, MessagesResponse, SendMessageRequest, SendMessageResponse,
};
use hush_types::events::GatewayEvent;
use hush_types::models::{ChannelId, MessageId};
use hush_visibility::Window;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_anchor")]
    pub anchor: Anchor,
    #[serde(default = "default_num_before")]
    pub num_before: usize,
    #[serde(default)]
    pub num_after: usize,
}

fn default_anchor() -> Anchor {
    Anchor::Newest
}

fn default_num_before() -> usize {
    50
}

/// Send a message. The message and its recipient index commit together;
/// the real-time event goes out only after that commit, to exactly the
/// materialized audience.
///
/// Commit and fan-out run in a detached task, so a client that hangs up
/// mid-request cannot cancel the event once the message is written.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let sender_id = claims.sub;
    let task = tokio::spawn(async move {
        // Run blocking DB work off the async runtime
        let db = state.clone();
        let sent = tokio::task::spawn_blocking(move || {
            db.db
                .atomic(|store| hush_visibility::send_message(store, sender_id, &req))
        })
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })??;

        let id = sent.message.id;
        let report = state
            .dispatcher
            .fan_out(
                sent.audience.iter().copied(),
                GatewayEvent::MessageCreate { message: sent.message },
            )
            .await;
        debug!(
            "message {} pushed to {} connections ({} audience offline)",
            id, report.delivered, report.offline
        );

        Ok::<_, ApiError>(id)
    });

    let id = task.await.map_err(|e| {
        error!("send task join error: {}", e);
        ApiError::Internal
    })??;

    Ok(Json(SendMessageResponse { result: "success", id }))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let viewer = claims.sub;
    let message = tokio::task::spawn_blocking(move || {
        db.db
            .read(|store| hush_visibility::get_message(store, viewer, MessageId(message_id)))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    Ok(Json(MessageResponse { result: "success", message }))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if query.num_before.saturating_add(query.num_after) > state.max_page {
        return Err(ApiError::BadRequest(format!(
            "Too many messages requested (maximum {}).",
            state.max_page
        )));
    }

    let window = Window {
        anchor: query.anchor,
        num_before: query.num_before,
        num_after: query.num_after,
    };
    let db = state.clone();
    let viewer = claims.sub;
    let messages = tokio::task::spawn_blocking(move || {
        db.db.read(|store| {
            hush_visibility::list_messages(store, viewer, ChannelId(channel_id), window)
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    Ok(Json(MessagesResponse {
        result: "success",
        anchor: query.anchor,
        messages,
    }))
}
