// One task per connected player: owns the WebSocket, forwards decoded
// frames to the Hub, drains a bounded outbound queue back to the wire, and
// enforces the ping/pong keep-alive deadline. Grounded in the teacher's
// `interface_adapters/net.rs` (`bootstrap_connection`, `run_client_loop`,
// per-connection `info_span!`), stripped of the auth handshake this system
// does not have.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant};

use crate::interface_adapters::protocol::{ClientMessage, ErrorPayload, ServerMessage};
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::hub::{HubHandle, PendingPlayer};

const OUTBOUND_QUEUE_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(54);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives one connection end to end: handshake, read/write loop, and the
/// unregister call on the way out. This is the single authoritative
/// unregister trigger (spec.md §4.2) -- every exit path below falls through
/// to it.
pub async fn handle_socket(mut socket: WebSocket, hub: HubHandle) {
    let player_id = rand_id();
    let span = tracing::info_span!("conn", player_id);
    let _enter = span.enter();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_CAPACITY);

    // Cosmetic identity (display name, avatar) is assigned by the Hub from
    // its own round-robin pool cursor, not derived here from the player id.
    hub.register(PendingPlayer {
        id: player_id,
        outbound: outbound_tx.clone(),
    })
    .await;
    tracing::info!("player connected");

    let mut ping_ticker = interval(PING_INTERVAL);
    ping_ticker.tick().await; // first tick fires immediately; discard it
    let mut deadline = Instant::now() + PONG_TIMEOUT;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                tracing::debug!("keep-alive deadline expired; closing connection");
                break;
            }
            _ = ping_ticker.tick() => {
                if tokio::time::timeout(WRITE_TIMEOUT, socket.send(Message::Ping(Vec::new().into())))
                    .await
                    .is_err()
                {
                    tracing::debug!("ping write timed out; closing connection");
                    break;
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if !send_frame(&mut socket, &message).await {
                            break;
                        }
                    }
                    // The Hub only drops its sender during unregister, by
                    // which point this task's inbound side has already
                    // observed the disconnect; reaching here is defensive.
                    None => break,
                }
            }
            incoming = socket.next() => {
                match incoming {
                    None => break,
                    Some(Err(error)) => {
                        tracing::debug!(%error, "read error; closing connection");
                        break;
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        deadline = Instant::now() + PONG_TIMEOUT;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        deadline = Instant::now() + PONG_TIMEOUT;
                    }
                    Some(Ok(Message::Text(text))) => {
                        deadline = Instant::now() + PONG_TIMEOUT;
                        if !dispatch_frame(&text, player_id, &hub, &outbound_tx).await {
                            tracing::debug!("protocol violation; closing connection");
                            break;
                        }
                    }
                }
            }
        }
    }

    hub.unregister(player_id).await;
    tracing::info!("player disconnected");
}

async fn send_frame(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(error) => {
            tracing::error!(%error, "failed to serialize outbound frame");
            return true; // not fatal to the connection
        }
    };
    tokio::time::timeout(WRITE_TIMEOUT, socket.send(Message::Text(text.into())))
        .await
        .is_ok()
}

/// Decodes one inbound text frame and routes it. Returns `false` when the
/// frame is a structural protocol violation (invalid JSON, or a JSON object
/// missing `type`) that the caller must treat as a reason to close the
/// connection (spec.md §4.1); returns `true` in every other case, including
/// an unrecognized `type` (logged and silently dropped, not an error) and a
/// recognized `type` with a malformed `payload` (reported back as an `error`
/// frame without closing, per spec.md §7).
async fn dispatch_frame(
    text: &str,
    player_id: u64,
    hub: &HubHandle,
    outbound_tx: &mpsc::Sender<ServerMessage>,
) -> bool {
    let envelope: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(%error, "invalid json frame");
            return false;
        }
    };
    let Some(frame_type) = envelope.get("type").and_then(|v| v.as_str()) else {
        tracing::debug!("frame missing required 'type' field");
        return false;
    };
    if !ClientMessage::KNOWN_TYPES.contains(&frame_type) {
        tracing::debug!(frame_type, "unrecognized frame type; dropping");
        return true;
    }

    match serde_json::from_value::<ClientMessage>(envelope) {
        Ok(message) => hub.incoming(player_id, message).await,
        Err(error) => {
            tracing::debug!(%error, "malformed frame payload");
            let _ = outbound_tx.try_send(ServerMessage::Error(ErrorPayload {
                message: "malformed frame".to_string(),
            }));
        }
    }
    true
}
