//! Live job event WebSocket.
//!
//! One connection can watch any number of jobs. Each subscribe joins the
//! job's broadcast room and spawns a forwarder that copies room events
//! into the connection's send queue; dropping the forwarder (unsubscribe
//! or disconnect) leaves the room. The socket itself is kept honest with
//! periodic pings and an activity timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use vtx_models::{ClientMessage, JobId, ServerMessage};

use crate::metrics;
use crate::rooms::JobRooms;
use crate::state::AppState;

/// Outbound queue depth per connection.
pub const WS_SEND_BUFFER_SIZE: usize = 32;

/// Ping cadence.
pub const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Disconnect after this long without any client activity.
pub const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    metrics::record_ws_connection();
    metrics::adjust_ws_active_connections(1.0);

    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(run_sender(sender, rx));

    run_connection(receiver, &tx, &state).await;

    drop(tx);
    let _ = send_task.await;
    metrics::adjust_ws_active_connections(-1.0);
    debug!("WebSocket connection closed");
}

/// Drain the send queue into the socket; exits when the queue closes or
/// the client goes away.
async fn run_sender(mut sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        if sender.send(message).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

async fn run_connection(
    mut receiver: SplitStream<WebSocket>,
    tx: &mpsc::Sender<Message>,
    state: &AppState,
) {
    let mut subscriptions: HashMap<JobId, JoinHandle<()>> = HashMap::new();
    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        metrics::record_ws_message_received();
                        handle_client_message(&text, tx, state, &mut subscriptions).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > WS_CLIENT_TIMEOUT {
                    info!("WebSocket client timed out");
                    break;
                }
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the forwarders drops their room receivers; the rooms are
    // pruned on the next publish or explicitly below.
    for (job_id, handle) in subscriptions.drain() {
        handle.abort();
        state.rooms.prune(&job_id).await;
    }
}

async fn handle_client_message(
    text: &str,
    tx: &mpsc::Sender<Message>,
    state: &AppState,
    subscriptions: &mut HashMap<JobId, JoinHandle<()>>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send_server_message(
                tx,
                &ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { job_id } => {
            if !subscriptions.contains_key(&job_id) {
                let room_rx = state.rooms.subscribe(&job_id).await;
                let handle = tokio::spawn(run_forwarder(
                    job_id.clone(),
                    room_rx,
                    tx.clone(),
                    state.rooms.clone(),
                ));
                subscriptions.insert(job_id.clone(), handle);
                debug!(job_id = %job_id, "WebSocket subscribed");
            }
            send_server_message(tx, &ServerMessage::Subscribed { job_id }).await;
        }
        ClientMessage::Unsubscribe { job_id } => {
            if let Some(handle) = subscriptions.remove(&job_id) {
                handle.abort();
                state.rooms.prune(&job_id).await;
                debug!(job_id = %job_id, "WebSocket unsubscribed");
            }
            send_server_message(tx, &ServerMessage::Unsubscribed { job_id }).await;
        }
    }
}

/// Copy one room's events into the connection's send queue.
async fn run_forwarder(
    job_id: JobId,
    mut room_rx: broadcast::Receiver<vtx_models::TranscodeEvent>,
    tx: mpsc::Sender<Message>,
    rooms: JobRooms,
) {
    loop {
        match room_rx.recv().await {
            Ok(event) => {
                if !send_server_message(&tx, &ServerMessage::Event(event)).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // A slow client loses intermediate events, not the stream.
                warn!(job_id = %job_id, missed, "WebSocket receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    drop(room_rx);
    rooms.prune(&job_id).await;
}

/// Queue a server message; falls back to an awaited send when the queue
/// is momentarily full. Returns false once the connection is gone.
async fn send_server_message(tx: &mpsc::Sender<Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize server message: {}", e);
            return true;
        }
    };

    let message_type = match message {
        ServerMessage::Subscribed { .. } => "subscribed",
        ServerMessage::Unsubscribed { .. } => "unsubscribed",
        ServerMessage::Event(_) => "event",
        ServerMessage::Error { .. } => "error",
    };

    match tx.try_send(Message::Text(json)) {
        Ok(()) => {
            metrics::record_ws_message_sent(message_type);
            true
        }
        Err(mpsc::error::TrySendError::Full(message)) => {
            if tx.send(message).await.is_ok() {
                metrics::record_ws_message_sent(message_type);
                true
            } else {
                false
            }
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
