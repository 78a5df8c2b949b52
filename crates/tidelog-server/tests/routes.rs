//! HTTP routes exercised through `tower::ServiceExt::oneshot`

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tidelog_server::{AppState, ServerConfig, router};
use tidelog_storage::InMemoryLogStore;
use tidelog_transport::{decode_header, unpack};
use tower::ServiceExt;

fn app() -> (Router, Arc<InMemoryLogStore>) {
    let store = Arc::new(InMemoryLogStore::new());
    let state = AppState::new(store.clone(), ServerConfig::default());
    (router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn command(app: &Router, command: Value) -> Response {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/cmd")
        .body(Body::from(command.to_string()))
        .unwrap();
    send(app, request).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_index() {
    let (app, _) = app();
    let response = send(&app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["service"], "tidelog");
}

#[tokio::test]
async fn test_command_add_then_read() {
    let (app, _) = app();
    let response = command(
        &app,
        json!({"cmd": "ADD", "entries": [
            {"log": "a", "payload": "x"},
            {"log": "a", "payload": "y"},
            {"log": "b", "payload": "z"},
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let added = body_json(response).await;
    assert_eq!(added["reply"], "added");
    assert_eq!(added["positions"].as_array().unwrap().len(), 3);

    let response = command(
        &app,
        json!({"cmd": "READ", "cursors": [["a", "0"], ["b", "0"]], "count": 10}),
    )
    .await;
    let read = body_json(response).await;
    assert_eq!(read["reply"], "read");
    let payloads: Vec<&str> = read["batch"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|b| b["entries"].as_array().unwrap())
        .map(|e| e["payload"].as_str().unwrap())
        .collect();
    assert_eq!(payloads, vec!["x", "y", "z"]);
}

#[tokio::test]
async fn test_command_rejects_garbage() {
    let (app, _) = app();
    let response = command(&app, json!({"cmd": "FLY"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("Invalid command"));
}

#[tokio::test]
async fn test_store_outage_is_unavailable() {
    let (app, store) = app();
    store.close();
    let response = command(&app, json!({"cmd": "LOGS"})).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_read_serves_packed_buffer() {
    let (app, _) = app();
    // Device prefixing is on: client "cam" lives at "default:cam"
    command(
        &app,
        json!({"cmd": "ADD", "entries": [
            {"log": "default:cam", "payload": "hi"},
            {"log": "default:cam", "payload": ""},
            {"log": "default:mic", "payload": "abc"},
        ]}),
    )
    .await;

    let response = send(&app, get("/data/cam+mic?last_entry_id=0&count=10")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let header = response.headers()["entry-offset"].to_str().unwrap().to_string();
    let header = decode_header(&header).unwrap();
    let buffer = body_bytes(response).await;

    let entries = unpack(&header, &buffer).unwrap();
    let rows: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|e| (e.log.as_str(), e.payload.as_ref()))
        .collect();
    assert_eq!(
        rows,
        vec![("cam", &b"hi"[..]), ("cam", &b""[..]), ("mic", &b"abc"[..])]
    );
}

#[tokio::test]
async fn test_read_latest_by_default() {
    let (app, _) = app();
    for payload in ["old", "new"] {
        command(
            &app,
            json!({"cmd": "ADD", "entries": [{"log": "default:cam", "payload": payload}]}),
        )
        .await;
    }

    let response = send(&app, get("/data/cam")).await;
    let header = decode_header(response.headers()["entry-offset"].to_str().unwrap()).unwrap();
    assert_eq!(header.len(), 1);
    assert_eq!(body_bytes(response).await, Bytes::from_static(b"new"));
}

#[tokio::test]
async fn test_read_rejects_bad_positions() {
    let (app, _) = app();
    let response = send(&app, get("/data/a?last_entry_id=soon")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/data/a+b+c?last_entry_id=0%2B0")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_read_of_non_log_key_is_reported() {
    let (app, store) = app();
    store.set_value("default:plain", "not a log").unwrap();
    command(
        &app,
        json!({"cmd": "ADD", "entries": [{"log": "default:cam", "payload": "hi"}]}),
    )
    .await;

    let response = send(&app, get("/data/cam+plain?last_entry_id=0")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["error"].as_str().unwrap().contains("default:plain"));
}

#[tokio::test]
async fn test_multipart_upload_by_filename() {
    let (app, _) = app();
    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"entries\"; filename=\"left\"\r\n",
        "Content-Type: application/octet-stream\r\n\r\n",
        "hello\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"entries\"; filename=\"right\"\r\n",
        "Content-Type: application/octet-stream\r\n\r\n",
        "world\r\n",
        "--XBOUNDARY--\r\n",
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/data/*?device_id=glass")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let logs = body_json(send(&app, get("/logs")).await).await;
    assert_eq!(logs, json!(["glass:left", "glass:right"]));

    let info = body_json(send(&app, get("/logs/glass:left")).await).await;
    assert_eq!(info["length"], 1);
    assert_eq!(info["last_entry"]["payload"], "hello");
}

#[tokio::test]
async fn test_upload_without_parts_is_rejected() {
    let (app, _) = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/data/cam")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from("--XBOUNDARY--\r\n"))
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_log_info_is_not_found() {
    let (app, _) = app();
    let response = send(&app, get("/logs/missing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_no_live_sessions() {
    let (app, _) = app();
    let sessions = body_json(send(&app, get("/sessions")).await).await;
    assert_eq!(sessions, json!([]));
}
