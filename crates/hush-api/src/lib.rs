pub mod error;
pub mod groups;
pub mod messages;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use hush_db::Database;
use hush_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Upper bound on `num_before + num_after` for one list request.
    pub max_page: usize,
}

/// Authenticated REST routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/{message_id}", get(messages::get_message))
        .route("/channels/{channel_id}/messages", get(messages::list_messages))
        .route(
            "/groups/{group_id}/members/{user_id}",
            put(groups::add_member).delete(groups::remove_member),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
