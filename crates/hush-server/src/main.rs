mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hush_api::middleware::decode_token;
use hush_api::{AppState, AppStateInner};
use hush_gateway::connection;
use hush_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_dev_secret() {
        warn!("HUSH_JWT_SECRET not set, using the development secret");
    }

    // Init database
    let db = hush_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: Dispatcher::new(),
        jwt_secret: config.jwt_secret.clone(),
        max_page: config.max_page,
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(hush_api::router(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Hush server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The JWT is validated here, before the upgrade, so the connection loop
/// starts already knowing its user.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let claims = decode_token(&query.token, &state.jwt_secret).ok_or(StatusCode::UNAUTHORIZED)?;
    let dispatcher = state.dispatcher.clone();

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, claims.sub)
    }))
}
