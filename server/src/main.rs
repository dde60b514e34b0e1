use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use skyjo_protocol::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

mod config;
mod error;
mod game;
mod handlers;
mod registry;

use config::ServerConfig;
use error::ActionError;
use handlers::RoomChange;
use registry::{Outbox, RoomRegistry};

#[derive(Clone)]
struct AppState {
    registry: Arc<RoomRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ServerConfig::parse();

    let state = AppState {
        registry: Arc::new(RoomRegistry::new(config.default_max_players())),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("server listening on ws://{addr}/ws");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "rooms": state.registry.room_count(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (tx_out, mut rx_out) = mpsc::unbounded_channel::<ServerToClient>();

    tokio::spawn(async move {
        while let Some(msg) = rx_out.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!("[WS] failed to encode {:?}: {}", msg, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let my_id = Uuid::new_v4();
    info!("[WS] connected {}", &my_id.to_string()[..8]);
    let _ = tx_out.send(ServerToClient::Hello { your_id: my_id });

    let mut joined_room: Option<String> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(t) => match serde_json::from_str::<ClientToServer>(&t) {
                Ok(cmd) => route_cmd(cmd, &state, &mut joined_room, my_id, &tx_out).await,
                Err(e) => {
                    debug!("[WS] bad json from {}: {}", &my_id.to_string()[..8], e);
                    send_error(&tx_out, &ActionError::validation("bad json"));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // A dropped connection leaves its room exactly like an explicit leave.
    info!("[WS] disconnected {}", &my_id.to_string()[..8]);
    if let Some(room) = joined_room {
        if let Err(e) = state.registry.leave_room(&room, my_id) {
            warn!("[WS] cleanup for {} in room {} failed: {}", &my_id.to_string()[..8], room, e);
        }
    }
}

async fn route_cmd(
    cmd: ClientToServer,
    state: &AppState,
    joined_room: &mut Option<String>,
    my_id: Uuid,
    tx_out: &Outbox,
) {
    debug!("[WS] from {} → {:?}", &my_id.to_string()[..8], cmd);

    let registry = Arc::clone(&state.registry);
    let room = joined_room.clone();
    let tx = tx_out.clone();
    let result = run_action(move || {
        handlers::dispatch(&registry, room.as_deref(), my_id, &tx, cmd)
    })
    .await;

    match result {
        Ok(RoomChange::Stay) => {}
        Ok(RoomChange::Entered(code)) => *joined_room = Some(code),
        Ok(RoomChange::Left) => *joined_room = None,
        Err(e) => {
            info!(
                "[REJECT] {} room={:?}: {}",
                &my_id.to_string()[..8],
                joined_room.as_deref(),
                e
            );
            send_error(tx_out, &e);
        }
    }
}

/// Run one action on its own task. A panic there reaches only this caller,
/// as `ActionError::Internal`.
async fn run_action<F>(action: F) -> Result<RoomChange, ActionError>
where
    F: FnOnce() -> Result<RoomChange, ActionError> + Send + 'static,
{
    match tokio::spawn(async move { action() }).await {
        Ok(result) => result,
        Err(e) => {
            error!("[WS] action task failed: {}", e);
            Err(ActionError::Internal)
        }
    }
}

fn send_error(tx_out: &Outbox, err: &ActionError) {
    let _ = tx_out.send(ServerToClient::Error {
        kind: err.kind(),
        message: err.to_string(),
    });
}
