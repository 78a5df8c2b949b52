//! Data routes: WebSocket sessions, one-shot reads and uploads

use std::time::Duration;

use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use tidelog_core::{AppendRequest, CursorTable, SystemClock};
use tidelog_engine::EngineError;
use tidelog_session::{PullSession, PushSession};
use tidelog_transport::{encode_header, pack};
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::query::{DataQuery, PullQuery, PushQuery, cursor_seed, split_logs};
use crate::registry::SessionKind;
use crate::state::AppState;
use crate::ws::WsFrameTransport;

/// Response header carrying the JSON frame header of a one-shot read
pub const ENTRY_OFFSET: HeaderName = HeaderName::from_static("entry-offset");

/// `GET /data/{log_ids}/pull`
///
/// Options are checked before the upgrade so bad requests get an HTTP error.
pub async fn pull(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(log_ids): Path<String>,
    Query(query): Query<PullQuery>,
) -> ServerResult<Response> {
    let logs = split_logs(&log_ids)?;
    let seed = cursor_seed(&logs, &query.last_entry_id)?;
    let options = query.options(state.engine.config());
    options.validate(logs.len())?;
    let namespace = state.namespace(
        query.device_id.as_deref(),
        &query.prefix,
        query.keep_device_id,
    );

    Ok(ws.on_upgrade(move |socket| async move {
        let _guard = state.sessions.register(SessionKind::Pull, logs);
        let session = PullSession::new(
            WsFrameTransport::new(socket),
            state.engine.reader().clone(),
            SystemClock,
            seed,
            namespace,
            options,
        );
        let result = match session {
            Ok(session) => session.run().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(stats) => info!(entries = stats.entries, cycles = stats.cycles, "Pull stream ended"),
            Err(e) => warn!(error = %e, "Pull stream failed"),
        }
    }))
}

/// `GET /data/{log_ids}/push`
pub async fn push(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(log_ids): Path<String>,
    Query(query): Query<PushQuery>,
) -> ServerResult<Response> {
    let logs = split_logs(&log_ids)?;
    let options = query.options();
    options.validate(logs.len())?;
    let namespace = state.namespace(query.device_id.as_deref(), &query.prefix, None);

    Ok(ws.on_upgrade(move |socket| async move {
        let _guard = state.sessions.register(SessionKind::Push, logs.clone());
        let session = PushSession::new(
            WsFrameTransport::new(socket),
            state.engine.writer().clone(),
            logs,
            namespace,
            options,
        );
        let result = match session {
            Ok(session) => session.run().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(stats) => info!(
                entries = stats.entries,
                rejected = stats.rejected,
                "Push stream ended"
            ),
            Err(e) => warn!(error = %e, "Push stream failed"),
        }
    }))
}

/// `GET /data/{log_ids}`
///
/// One non-blocking read. The body is the packed buffer; the header rows
/// travel in the `entry-offset` response header. A log that fails to read
/// fails the whole request.
pub async fn read(
    State(state): State<AppState>,
    Path(log_ids): Path<String>,
    Query(query): Query<DataQuery>,
) -> ServerResult<Response> {
    let logs = split_logs(&log_ids)?;
    let (seed, policy) = query.plan(&logs)?;
    let namespace = state.namespace(
        query.device_id.as_deref(),
        &query.prefix,
        query.keep_device_id,
    );

    let mut cursor = CursorTable::init(seed, &namespace.store_prefix(), &SystemClock);
    let batch = state
        .engine
        .reader()
        .read(&mut cursor, policy, query.count, Some(Duration::ZERO))
        .await?;
    if let Some(error) = batch.iter().find_map(|b| b.error.clone()) {
        return Err(EngineError::from(error).into());
    }

    let (mut header, buffer) = pack(&batch);
    for row in &mut header {
        row.log = namespace.present(&row.log);
    }
    debug!(entries = header.len(), bytes = buffer.len(), "Served read");

    let offsets = HeaderValue::from_str(&encode_header(&header)?)
        .map_err(|e| ServerError::bad_request(format!("log names do not fit a header: {e}")))?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (ENTRY_OFFSET, offsets),
        ],
        buffer,
    )
        .into_response())
}

/// `POST /data/{log_id}`
///
/// Every multipart part becomes one entry, all appended as one batch. With
/// log id `*` each part's filename names its log.
pub async fn upload(
    State(state): State<AppState>,
    Path(log_id): Path<String>,
    Query(query): Query<DataQuery>,
    mut multipart: Multipart,
) -> ServerResult<Json<Vec<String>>> {
    let namespace = state.namespace(query.device_id.as_deref(), &query.prefix, None);

    let mut requests = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let log = if log_id == "*" {
            field
                .file_name()
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| ServerError::bad_request("every part needs a filename when uploading to *"))?
        } else {
            log_id.clone()
        };
        let payload = field.bytes().await?;
        requests.push(AppendRequest::new(namespace.qualify(&log), payload));
    }
    if requests.is_empty() {
        return Err(ServerError::bad_request("no entries uploaded"));
    }

    let positions = state.engine.writer().append_batch(&requests).await?;
    debug!(entries = positions.len(), "Stored upload");
    Ok(Json(positions.iter().map(ToString::to_string).collect()))
}
