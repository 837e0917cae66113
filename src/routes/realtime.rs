//! Realtime websocket: change feed and dashboard pushes.
//!
//! DESIGN
//! ======
//! On upgrade the ticket is consumed, the caller's profile is loaded, and a
//! per-connection channel is registered with the [`RealtimeHub`]. The
//! connection then runs a `select!` loop:
//! - incoming client frames → parse + dispatch by syscall prefix
//! - hub frames (`change:*`, `dashboard:refresh`, `realtime:status`) → forward
//!
//! Handler functions validate and return an `Outcome`; the dispatch layer
//! turns it into the reply frame.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and the realtime phase
//! 2. `realtime:subscribe {tables, events}` narrows which changes are pushed
//! 3. Close → remove from the hub
//!
//! A user's connections are dropped from the hub when their account or
//! permissions change; the loop ends when its hub channel closes.
//!
//! [`RealtimeHub`]: crate::realtime::hub::RealtimeHub

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::realtime::{ChangeKind, Table};
use crate::services::access::{Permission, Principal};
use crate::services::{profile, session};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
}

/// Permission needed to watch a table's changes.
pub(crate) fn table_permission(table: Table) -> Permission {
    match table {
        Table::Clients => Permission::ClientsRead,
        Table::Deposits | Table::Withdrawals | Table::Transfers | Table::DirectOperations => {
            Permission::OperationsRead
        }
        Table::Profiles | Table::UserPermissions => Permission::UsersManage,
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user_id = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(uid)) => uid,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    let principal = match profile::load_principal(&state.pool, user_id).await {
        Ok(Some(principal)) => principal,
        Ok(None) => return (StatusCode::FORBIDDEN, "profile inactive").into_response(),
        Err(e) => {
            tracing::error!(error = %e, %user_id, "ws profile lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "profile lookup error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, principal))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, principal: Principal) {
    let client_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);
    let dashboard = principal.can(Permission::OperationsRead);
    state.hub.register(client_id, principal.id, dashboard, client_tx).await;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", principal.id.to_string())
        .with_data("realtime", serde_json::json!(state.phase()));
    if send_frame(&mut socket, &welcome).await.is_err() {
        state.hub.remove(client_id).await;
        return;
    }

    let connections = state.hub.len().await;
    info!(%client_id, user_id = %principal.id, connections, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &principal, client_id, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frame = client_rx.recv() => {
                let Some(frame) = frame else {
                    info!(%client_id, user_id = %principal.id, "ws: connection revoked");
                    break;
                };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.remove(client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(state: &AppState, principal: &Principal, client_id: Uuid, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };
    let req = req.with_from(principal.id.to_string());
    info!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "realtime" => handle_realtime(state, principal, client_id, &req).await,
        "dashboard" => handle_dashboard(state, principal, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

fn string_list(req: &Frame, key: &str) -> Vec<String> {
    req.data
        .get(key)
        .and_then(serde_json::Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

// =============================================================================
// REALTIME HANDLERS
// =============================================================================

async fn handle_realtime(state: &AppState, principal: &Principal, client_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "subscribe" => {
            let mut tables = Vec::new();
            for raw in string_list(req, "tables") {
                let table: Table = raw.parse().map_err(|e| req.error(format!("{e}")))?;
                tables.push(table);
            }
            if tables.is_empty() {
                tables = Table::LEDGER.to_vec();
            }
            let mut kinds = Vec::new();
            for raw in string_list(req, "events") {
                let kind = ChangeKind::parse(&raw).ok_or_else(|| req.error(format!("unknown event: {raw}")))?;
                kinds.push(kind);
            }

            let allowed: Vec<Table> = tables.into_iter().filter(|t| principal.can(table_permission(*t))).collect();
            if allowed.is_empty() {
                return Err(req.error("permission denied for requested tables"));
            }
            state.hub.subscribe(client_id, &allowed, &kinds).await;

            let mut data = Data::new();
            data.insert("tables".into(), serde_json::json!(state.hub.tables_for(client_id).await));
            Ok(Outcome::Reply(data))
        }
        "unsubscribe" => {
            state.hub.unsubscribe(client_id).await;
            Ok(Outcome::Done)
        }
        "status" => {
            let mut data = Data::new();
            data.insert("realtime".into(), serde_json::json!(state.phase()));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown realtime op: {op}"))),
    }
}

// =============================================================================
// DASHBOARD HANDLERS
// =============================================================================

async fn handle_dashboard(state: &AppState, principal: &Principal, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "get" => {
            principal.require(Permission::OperationsRead).map_err(|e| req.error_from(&e))?;
            let snapshot = super::stats::current_snapshot(state).await.map_err(|e| req.error_from(&e))?;
            let mut data = Data::new();
            data.insert("snapshot".into(), serde_json::json!(snapshot));
            Ok(Outcome::Reply(data))
        }
        op => Err(req.error(format!("unknown dashboard op: {op}"))),
    }
}

// =============================================================================
// SEND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == crate::frame::Status::Error {
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, message, "ws: send frame status=Error");
    } else {
        tracing::debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
