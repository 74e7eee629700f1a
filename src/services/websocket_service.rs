use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{BuzzerAck, BuzzerInboundMessage, BuzzerOutboundMessage},
    error::AppError,
    services::{berserk_service, session_service},
    state::{BuzzerConnection, SharedState, game::Team},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Writer channel closed; the connection must be torn down.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle for an individual buzzer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let Some(team) = identify(&state, &initial_message) else {
        let _ = send_message(
            &outbound_tx,
            &BuzzerOutboundMessage::Error {
                message: "Not logged in".into(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let connection_id = Uuid::new_v4();
    state.buzzers().insert(
        connection_id,
        BuzzerConnection {
            team_id: team.id,
            tx: outbound_tx.clone(),
        },
    );
    info!(team = %team.name, %connection_id, "buzzer connected");

    let is_unlocked = state
        .round3()
        .read()
        .await
        .current()
        .is_some_and(|question| question.is_active);
    let greeting = send_message(
        &outbound_tx,
        &BuzzerOutboundMessage::Ack(BuzzerAck {
            team_id: team.id,
            team_name: team.name.clone(),
            status: "connected".into(),
        }),
    )
    .and_then(|()| send_message(&outbound_tx, &BuzzerOutboundMessage::Question { is_unlocked }));
    if greeting.is_err() {
        info!(team = %team.name, "connection closed during greeting, terminating");
        state.buzzers().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match BuzzerInboundMessage::from_json_str(&text) {
                Ok(BuzzerInboundMessage::Buzz) => {
                    if handle_buzz(&state, &team, &outbound_tx).await.is_err() {
                        info!(team = %team.name, "connection closed during buzz handling, terminating");
                        break;
                    }
                }
                Ok(BuzzerInboundMessage::Identification { .. }) => {
                    warn!(team = %team.name, "ignoring duplicate identification message");
                }
                Ok(BuzzerInboundMessage::Unknown) => {
                    warn!(team = %team.name, payload = %text, "ignoring unknown buzzer message");
                }
                Err(err) => {
                    warn!(team = %team.name, error = %err, "failed to parse buzzer message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(team = %team.name, "buzzer closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(team = %team.name, error = %err, "websocket error");
                break;
            }
        }
    }

    state.buzzers().remove(&connection_id);
    info!(team = %team.name, %connection_id, "buzzer disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Resolve the team named by an identification frame.
fn identify(state: &SharedState, frame: &str) -> Option<Team> {
    match BuzzerInboundMessage::from_json_str(frame) {
        Ok(BuzzerInboundMessage::Identification { token }) => {
            let team = session_service::team_for_token(state, &token);
            if team.is_none() {
                warn!("buzzer identified with an unknown session token");
            }
            team
        }
        Ok(_) => {
            warn!("first message was not identification");
            None
        }
        Err(err) => {
            warn!(error = %err, "failed to parse identification message");
            None
        }
    }
}

/// Record a hit and answer with the outcome or the rejection reason.
async fn handle_buzz(
    state: &SharedState,
    team: &Team,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ConnectionClosed> {
    let reply = match berserk_service::record_hit(state, team).await {
        Ok(response) => BuzzerOutboundMessage::Feedback(response),
        Err(err) => {
            warn!(team = %team.name, error = %err, "buzz rejected");
            BuzzerOutboundMessage::Error {
                message: AppError::from(err).to_string(),
            }
        }
    };
    send_message(outbound_tx, &reply)
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// A serialization failure is logged and swallowed; only a closed writer is
/// reported.
fn send_message<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Push `message` to every connected buzzer, dropping dead connections.
pub fn notify_buzzers(state: &SharedState, message: &BuzzerOutboundMessage) {
    let dead: Vec<Uuid> = state
        .buzzers()
        .iter()
        .filter(|entry| send_message(&entry.value().tx, message).is_err())
        .map(|entry| *entry.key())
        .collect();
    for connection_id in dead {
        warn!(%connection_id, "send failed (writer closed), removing buzzer connection");
        state.buzzers().remove(&connection_id);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
