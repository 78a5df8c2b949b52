//! HTTP and WebSocket routes
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | liveness |
//! | `GET /data/{log_ids}/pull` | WebSocket pull session |
//! | `GET /data/{log_ids}/push` | WebSocket push session |
//! | `GET /data/{log_ids}` | one non-blocking read, header in `entry-offset` |
//! | `POST /data/{log_id}` | multipart upload, one entry per part |
//! | `GET /logs`, `GET /logs/{log}` | listing and summary |
//! | `GET /sessions` | live WebSocket sessions |
//! | `PUT /cmd` | JSON engine command |

mod cmd;
mod data;
mod logs;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data/{log_ids}", get(data::read).post(data::upload))
        .route("/data/{log_ids}/pull", get(data::pull))
        .route("/data/{log_ids}/push", get(data::push))
        .route("/logs", get(logs::list))
        .route("/logs/{log}", get(logs::info))
        .route("/sessions", get(logs::sessions))
        .route("/cmd", put(cmd::execute))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "tidelog",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
