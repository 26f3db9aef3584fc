use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use futures_util::FutureExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use hush_api::{AppState, AppStateInner, router};
use hush_db::Database;
use hush_gateway::dispatcher::Dispatcher;
use hush_types::api::Claims;
use hush_types::events::GatewayEvent;
use hush_types::models::{ChannelId, GroupId, UserId};

const SECRET: &str = "test-secret";

struct Harness {
    state: AppState,
    app: Router,
    channel: ChannelId,
    group: GroupId,
    hamlet: UserId,
    cordelia: UserId,
    othello: UserId,
}

fn harness() -> Harness {
    let db = Database::open_in_memory().unwrap();
    let channel = db.create_channel("Verona").unwrap();
    let hamlet = db.create_user("hamlet").unwrap();
    let cordelia = db.create_user("cordelia").unwrap();
    let othello = db.create_user("othello").unwrap();
    for user in [hamlet, cordelia, othello] {
        db.subscribe(channel, user).unwrap();
    }
    let group = db.create_group("whisper_test_group", &[cordelia]).unwrap();

    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: Dispatcher::new(),
        jwt_secret: SECRET.into(),
        max_page: 200,
    });
    Harness { app: router(state.clone()), state, channel, group, hamlet, cordelia, othello }
}

fn token(user: UserId) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as usize + 3600;
    encode(
        &Header::default(),
        &Claims { sub: user, exp },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, user: Option<UserId>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, method: Method, uri: &str, user: Option<UserId>, body: Option<Value>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request(method, uri, user, body)).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn whisper(h: &Harness, users: &[UserId], groups: &[GroupId]) -> i64 {
    let (status, body) = call(
        &h.app,
        Method::POST,
        "/messages",
        Some(h.hamlet),
        Some(json!({
            "type": "channel",
            "channel_id": h.channel,
            "topic": "whisper test",
            "content": "This is a whispered message",
            "whisper_to_user_ids": users,
            "whisper_to_group_ids": groups,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let h = harness();
    let (status, _) = call(&h.app, Method::GET, "/messages/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_recipient_gets_invalid_message() {
    let h = harness();
    let id = whisper(&h, &[h.cordelia], &[]).await;

    let (status, body) = call(&h.app, Method::GET, &format!("/messages/{id}"), Some(h.cordelia), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["whisper_recipients"]["user_ids"], json!([h.cordelia]));

    let (status, body) = call(&h.app, Method::GET, &format!("/messages/{id}"), Some(h.othello), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Invalid message(s)");

    let (status, missing) = call(&h.app, Method::GET, "/messages/9999", Some(h.othello), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing, body);
}

#[tokio::test]
async fn whisper_in_direct_message_is_an_error() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        Method::POST,
        "/messages",
        Some(h.hamlet),
        Some(json!({
            "type": "direct",
            "recipient_ids": [h.cordelia],
            "content": "This is a DM, whisper should cause error",
            "whisper_to_user_ids": [h.othello],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Whispers can only be sent in channels");
    assert_eq!(h.state.db.message_count().unwrap(), 0);
}

#[tokio::test]
async fn narrow_hides_whispers_from_non_recipients() {
    let h = harness();
    let (_, public) = call(
        &h.app,
        Method::POST,
        "/messages",
        Some(h.hamlet),
        Some(json!({ "type": "channel", "channel_id": h.channel, "topic": "t", "content": "Public message" })),
    )
    .await;
    let public_id = public["id"].as_i64().unwrap();
    let whisper_id = whisper(&h, &[h.cordelia], &[]).await;

    let uri = format!("/channels/{}/messages?anchor=oldest&num_before=0&num_after=10", h.channel);
    let ids = |body: &Value| -> Vec<i64> {
        body["messages"].as_array().unwrap().iter().map(|m| m["id"].as_i64().unwrap()).collect()
    };

    let (_, body) = call(&h.app, Method::GET, &uri, Some(h.hamlet), None).await;
    assert_eq!(ids(&body), vec![public_id, whisper_id]);
    let (_, body) = call(&h.app, Method::GET, &uri, Some(h.cordelia), None).await;
    assert_eq!(ids(&body), vec![public_id, whisper_id]);
    let (_, body) = call(&h.app, Method::GET, &uri, Some(h.othello), None).await;
    assert_eq!(ids(&body), vec![public_id]);
}

#[tokio::test]
async fn adding_member_grants_access_to_past_whispers() {
    let h = harness();
    let id = whisper(&h, &[], &[h.group]).await;
    let uri = format!("/messages/{id}");

    let (status, _) = call(&h.app, Method::GET, &uri, Some(h.othello), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let members = format!("/groups/{}/members/{}", h.group, h.othello);
    let (status, body) = call(&h.app, Method::PUT, &members, Some(h.hamlet), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);

    let (status, _) = call(&h.app, Method::GET, &uri, Some(h.othello), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_window_is_rejected() {
    let h = harness();
    let uri = format!("/channels/{}/messages?anchor=newest&num_before=150&num_after=100", h.channel);
    let (status, _) = call(&h.app, Method::GET, &uri, Some(h.hamlet), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_goes_to_the_send_time_audience_only() {
    let h = harness();
    let (_, mut cordelia_rx) = h.state.dispatcher.register(h.cordelia).await;
    let (_, mut othello_rx) = h.state.dispatcher.register(h.othello).await;

    let id = whisper(&h, &[], &[h.group]).await;
    match cordelia_rx.try_recv() {
        Ok(GatewayEvent::MessageCreate { message }) => assert_eq!(message.id.0, id),
        other => panic!("expected MessageCreate, got {other:?}"),
    }
    assert!(othello_rx.try_recv().is_err());

    // Joining later grants read access but never replays the event.
    h.state.db.add_group_member(h.group, h.othello).unwrap();
    assert!(othello_rx.try_recv().is_err());
}

#[tokio::test]
async fn event_survives_a_client_that_hangs_up() {
    let h = harness();
    let (_, mut cordelia_rx) = h.state.dispatcher.register(h.cordelia).await;

    let send = request(
        Method::POST,
        "/messages",
        Some(h.hamlet),
        Some(json!({
            "type": "channel",
            "channel_id": h.channel,
            "topic": "whisper test",
            "content": "sent, then the client went away",
            "whisper_to_user_ids": [h.cordelia],
        })),
    );
    // One poll starts the send; dropping the future is the client hanging up.
    assert!(h.app.clone().oneshot(send).now_or_never().is_none());

    let event = tokio::time::timeout(Duration::from_secs(5), cordelia_rx.recv())
        .await
        .expect("event was never dispatched");
    match event {
        Some(GatewayEvent::MessageCreate { message }) => {
            assert_eq!(message.content, "sent, then the client went away")
        }
        other => panic!("expected MessageCreate, got {other:?}"),
    }
    assert_eq!(h.state.db.message_count().unwrap(), 1);
}

#[tokio::test]
async fn unknown_sender_is_a_client_error() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        Method::POST,
        "/messages",
        Some(UserId(999)),
        Some(json!({ "type": "direct", "recipient_ids": [h.cordelia], "content": "hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Invalid sender id: 999");
    assert_eq!(h.state.db.message_count().unwrap(), 0);
}
