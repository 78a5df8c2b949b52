//! Log listing, summaries and live sessions

use axum::Json;
use axum::extract::{Path, State};
use tidelog_engine::InfoView;

use crate::error::{ServerError, ServerResult};
use crate::registry::SessionInfo;
use crate::state::AppState;

/// `GET /logs`
pub async fn list(State(state): State<AppState>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(state.engine.reader().logs().await?))
}

/// `GET /logs/{log}`
///
/// `log` is the store name; no device prefix is applied.
pub async fn info(
    State(state): State<AppState>,
    Path(log): Path<String>,
) -> ServerResult<Json<InfoView>> {
    match state.engine.reader().info(&log).await? {
        Some(info) => Ok(Json(InfoView::from(&info))),
        None => Err(ServerError::NotFound(log)),
    }
}

/// `GET /sessions`
pub async fn sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions.list())
}
