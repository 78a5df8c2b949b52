//! `PUT /cmd`

use axum::Json;
use axum::extract::State;
use tidelog_core::SystemClock;
use tidelog_engine::{CommandReply, parse_command};

use crate::error::ServerResult;
use crate::state::AppState;

/// Decode one JSON command and run it against the engines
///
/// Log names are passed through unqualified.
pub async fn execute(State(state): State<AppState>, body: String) -> ServerResult<Json<CommandReply>> {
    let command = parse_command(&body)?;
    let reply = state.engine.execute(command, &SystemClock).await?;
    Ok(Json(reply))
}
