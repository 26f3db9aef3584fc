use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, info};

use hush_types::api::{Claims, MembershipResponse};
use hush_types::models::{GroupId, UserId};
use hush_visibility::{RecipientKind, WhisperError};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Group membership edits. They never touch message history; whisper
/// access for the group follows on the next read.
///
/// Permissions on who may edit a group belong to the membership service;
/// here any authenticated user may.
pub async fn add_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (group_id, user_id) = (GroupId(group_id), UserId(user_id));
    let db = state.clone();
    let changed = tokio::task::spawn_blocking(move || {
        check_entities(&db, group_id, user_id)?;
        db.db.add_group_member(group_id, user_id).map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    if changed {
        info!("{} added user {} to group {}", claims.sub, user_id, group_id);
    }
    Ok(Json(MembershipResponse { result: "success", changed }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (group_id, user_id) = (GroupId(group_id), UserId(user_id));
    let db = state.clone();
    let changed = tokio::task::spawn_blocking(move || {
        check_entities(&db, group_id, user_id)?;
        db.db.remove_group_member(group_id, user_id).map_err(ApiError::from)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    if changed {
        info!("{} removed user {} from group {}", claims.sub, user_id, group_id);
    }
    Ok(Json(MembershipResponse { result: "success", changed }))
}

fn check_entities(state: &AppState, group_id: GroupId, user_id: UserId) -> ApiResult<()> {
    if !state.db.group_exists(group_id)? {
        return Err(WhisperError::UnknownRecipient { kind: RecipientKind::Group, id: group_id.0 }.into());
    }
    if !state.db.user_exists(user_id)? {
        return Err(WhisperError::UnknownRecipient { kind: RecipientKind::User, id: user_id.0 }.into());
    }
    Ok(())
}
