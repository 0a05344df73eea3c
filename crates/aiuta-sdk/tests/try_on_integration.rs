//! End-to-end tests of the host SDK against an in-memory page.
//!
//! The iframe document is played by an `aiuta_rpc::Connection` attached to
//! the frame created by `Aiuta`, or by hand-written envelopes where the wire
//! shape itself is under test.

use std::sync::Arc;
use std::time::Duration;

use aiuta_rpc::protocol::actions::methods;
use aiuta_rpc::{
    validate_message, Connection, HandlerError, Message, MessageTarget, MessageType,
    PageEnvironment, RpcConfig, RpcError, HANDSHAKE_ACTION,
};
use aiuta_sdk::infrastructure::document::memory::{FrameEnd, MemoryDocument};
use aiuta_sdk::infrastructure::document::{Document, IframeElement};
use aiuta_sdk::{Aiuta, AiutaConfiguration, AiutaError};
use serde_json::{json, Value};

const PAGE: &str = "https://shop.example/p/42";
const HOST: &str = "https://shop.example";
const APP_URL: &str = "https://static.aiuta.com/sdk/v0/index.html";
const APP: &str = "https://static.aiuta.com";
const IFRAME_ID: &str = "aiuta-iframe";

fn rpc_config() -> RpcConfig {
    RpcConfig {
        call_timeout: Duration::from_millis(500),
        connect_timeout: Duration::from_secs(2),
        handshake_retry_interval: Duration::from_millis(20),
    }
}

fn widget() -> (Arc<Aiuta>, Arc<MemoryDocument>) {
    let doc = Arc::new(MemoryDocument::new(PAGE));
    let aiuta = Aiuta::new(
        AiutaConfiguration::with_api_key("k").with_app_url(APP_URL),
        doc.clone(),
        &PageEnvironment::new(PAGE),
    )
    .expect("valid configuration")
    .with_rpc_config(rpc_config());
    (Arc::new(aiuta), doc)
}

/// Waits until `try_on` has appended the iframe, then takes its document side.
async fn attach(doc: &MemoryDocument) -> FrameEnd {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if doc.find_iframe(IFRAME_ID).is_some() {
                return doc.attach_frame(IFRAME_ID).expect("frame attaches once");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("iframe must be created")
}

/// The try-on app: answers the handshake and `app.tryOn`.
fn run_app(frame: FrameEnd) -> Connection {
    assert_eq!(frame.origin, APP);
    let app = Connection::new(
        Arc::new(frame.parent),
        HOST,
        json!({"appVersion": "1.0.0"}),
        rpc_config(),
    );
    app.register_handler(methods::APP_TRY_ON, |data: Value| async move {
        Ok::<_, HandlerError>(json!({"opened": data[0]}))
    });
    app.spawn_listener(frame.inbox);
    app
}

async fn next_message(frame: &mut FrameEnd) -> Message {
    let event = tokio::time::timeout(Duration::from_secs(1), frame.inbox.recv())
        .await
        .expect("host must post")
        .expect("inbox open");
    assert_eq!(event.origin, HOST);
    validate_message(&event.data).expect("host posts valid envelopes")
}

#[tokio::test]
async fn test_try_on_creates_iframe_connects_and_calls_the_app() {
    // Arrange
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("sku-42").await }
    });

    // Act
    let app = run_app(attach(&doc).await);
    let result = call.await.expect("task").expect("try_on succeeds");

    // Assert
    assert_eq!(result, json!({"opened": ["sku-42"]}));
    assert!(aiuta.is_connected());
    assert_eq!(doc.iframe_count(), 1);

    let src = doc.find_iframe(IFRAME_ID).unwrap().src;
    assert!(src.starts_with(APP_URL));
    assert!(src.contains("parentOrigin=https%3A%2F%2Fshop.example"));

    // The app received the host context during the handshake.
    assert_eq!(app.context()["config"]["auth"]["apiKey"], "k");
    assert_eq!(app.context()["sdkVersion"], aiuta_sdk::SDK_VERSION);
}

#[tokio::test]
async fn test_handshake_on_the_wire() {
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on(vec!["a", "b"]).await }
    });
    let mut frame = attach(&doc).await;

    // Arrange: the first envelope is the handshake request.
    let handshake = next_message(&mut frame).await;
    assert_eq!(handshake.kind, MessageType::Request);
    assert_eq!(handshake.action.as_deref(), Some(HANDSHAKE_ACTION));
    assert_eq!(handshake.data.as_ref().unwrap()["config"]["auth"]["apiKey"], "k");

    // Act: answer it by hand.
    frame
        .parent
        .post_message(
            Message::response(handshake.id, json!({"appVersion": "1.0.0"})).to_value(),
            HOST,
        )
        .unwrap();

    // Assert: skip any handshake retries until the tryOn request arrives.
    let request = loop {
        let message = next_message(&mut frame).await;
        if !message.is_handshake() {
            break message;
        }
    };
    assert_eq!(request.action.as_deref(), Some(methods::APP_TRY_ON));
    assert_eq!(request.data, Some(json!([["a", "b"]])));
    assert!(aiuta.is_connected());
    assert_eq!(
        aiuta.connection().unwrap().context(),
        json!({"appVersion": "1.0.0"})
    );

    frame
        .parent
        .post_message(Message::response(request.id, json!(true)).to_value(), HOST)
        .unwrap();
    assert_eq!(call.await.unwrap().unwrap(), json!(true));
}

#[tokio::test]
async fn test_app_toggles_iframe_interactivity() {
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("sku-1").await }
    });
    let app = run_app(attach(&doc).await);
    call.await.unwrap().unwrap();
    assert_eq!(aiuta.iframe().pointer_events().as_deref(), Some("none"));

    app.call(methods::SDK_SET_INTERACTIVE, json!([true]))
        .await
        .unwrap();
    assert_eq!(aiuta.iframe().pointer_events().as_deref(), Some("auto"));

    app.call(methods::SDK_SET_INTERACTIVE, json!([false]))
        .await
        .unwrap();
    assert_eq!(aiuta.iframe().pointer_events().as_deref(), Some("none"));
}

#[tokio::test]
async fn test_set_interactive_with_bad_arguments_is_rejected() {
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("sku-1").await }
    });
    let app = run_app(attach(&doc).await);
    call.await.unwrap().unwrap();

    let err = app
        .call(methods::SDK_SET_INTERACTIVE, json!(["yes"]))
        .await
        .unwrap_err();

    match err {
        RpcError::Remote { code, .. } => assert_eq!(code.as_deref(), Some("invalid_arguments")),
        other => panic!("expected a remote error, got {other:?}"),
    }
    assert_eq!(aiuta.iframe().pointer_events().as_deref(), Some("none"));
}

#[tokio::test]
async fn test_second_try_on_reuses_iframe_and_connection() {
    let (aiuta, doc) = widget();
    let first = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("one").await }
    });
    let _app = run_app(attach(&doc).await);
    first.await.unwrap().unwrap();

    let second = aiuta.try_on("two").await.unwrap();

    assert_eq!(second, json!({"opened": ["two"]}));
    assert_eq!(doc.iframe_count(), 1);
}

#[tokio::test]
async fn test_iframe_removed_by_the_page_is_recreated_with_a_new_connection() {
    // Arrange
    let (aiuta, doc) = widget();
    let first = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("one").await }
    });
    let first_app = run_app(attach(&doc).await);
    first.await.unwrap().unwrap();
    let first_conn = aiuta.connection().unwrap();

    // Act: the page drops the iframe, and its document with it.
    doc.remove_iframe(IFRAME_ID).unwrap();
    first_app.destroy();
    let second = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("two").await }
    });
    let _second_app = run_app(attach(&doc).await);
    let result = second.await.unwrap().unwrap();

    // Assert
    assert_eq!(result, json!({"opened": ["two"]}));
    assert_eq!(doc.iframe_count(), 1);
    assert!(first_conn.is_destroyed());
    assert!(aiuta.is_connected());
}

#[tokio::test]
async fn test_connection_to_a_closed_window_is_discarded() {
    // Arrange
    let (aiuta, doc) = widget();
    let first = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("one").await }
    });
    let first_app = run_app(attach(&doc).await);
    first.await.unwrap().unwrap();

    // The page swaps in its own element under the same id, so it is adopted
    // rather than recreated.
    doc.remove_iframe(IFRAME_ID).unwrap();
    first_app.destroy();
    tokio::time::sleep(Duration::from_millis(20)).await;
    doc.append_iframe(IframeElement::new(IFRAME_ID, APP_URL)).unwrap();

    // Act
    let err = aiuta.try_on("two").await.unwrap_err();

    // Assert
    assert!(matches!(err, AiutaError::Rpc(RpcError::Transport(_))));
    assert!(aiuta.connection().is_none());

    // The next attempt handshakes with the adopted frame.
    let third = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("three").await }
    });
    let _app = run_app(attach(&doc).await);
    assert_eq!(third.await.unwrap().unwrap(), json!({"opened": ["three"]}));
    assert_eq!(doc.iframe_count(), 1);
}

#[tokio::test]
async fn test_untrusted_origin_cannot_complete_the_handshake() {
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("sku-1").await }
    });
    let mut frame = attach(&doc).await;
    let handshake = next_message(&mut frame).await;

    // A third party replays a valid-looking handshake response.
    doc.deliver(
        "https://evil.example",
        Message::response(handshake.id, json!({"appVersion": "6.6.6"})).to_value(),
    );

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, AiutaError::Rpc(RpcError::ConnectTimeout(_))));
    assert!(!aiuta.is_connected());
}

#[tokio::test]
async fn test_destroy_removes_iframe_and_fails_in_flight_call() {
    let (aiuta, doc) = widget();
    let call = tokio::spawn({
        let aiuta = aiuta.clone();
        async move { aiuta.try_on("sku-1").await }
    });
    let mut frame = attach(&doc).await;
    let handshake = next_message(&mut frame).await;
    frame
        .parent
        .post_message(Message::response(handshake.id, json!({})).to_value(), HOST)
        .unwrap();
    // Wait for the tryOn request, then never answer it.
    while next_message(&mut frame).await.is_handshake() {}

    aiuta.destroy();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, AiutaError::Rpc(RpcError::ConnectionClosed)));
    assert_eq!(doc.iframe_count(), 0);
    assert!(aiuta.connection().is_none());
    assert!(!aiuta.rpc().is_live());
}
