use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{AdminHandshake, PhaseChangedEvent, ServerEvent, SystemStatus},
    error::ServiceError,
    state::SharedState,
};

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Subscribe to the admin-only SSE stream.
pub async fn subscribe_admin(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.admin_sse().subscribe();
    Ok((receiver, token))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Carries the shared state so teardown can release the admin token.
    Admin(SharedState),
}

/// Events replayed to a new subscriber before live traffic: current phase and degraded flag.
pub async fn greeting_events(state: &SharedState) -> Vec<ServerEvent> {
    let phase = state.state_machine_phase().await;
    let current_question = state.round3().read().await.current_id();
    let mut events = Vec::with_capacity(2);
    if let Ok(event) = ServerEvent::json(
        Some("phase_changed".to_string()),
        &PhaseChangedEvent {
            active_round: phase.round.number(),
            round_status: phase.status,
            current_question,
        },
    ) {
        events.push(event);
    }
    if let Ok(event) = ServerEvent::json(
        Some("system_status".to_string()),
        &SystemStatus {
            degraded: state.is_degraded(),
        },
    ) {
        events.push(event);
    }
    events
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, sending `initial` first,
/// forwarding events and cleaning up once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => tracing::info!("Public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                tracing::info!("Admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, generating one when none exists
/// and failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Token announcement sent first on the admin stream.
pub fn admin_handshake(token: &str) -> Option<ServerEvent> {
    ServerEvent::json(
        Some("admin_token".to_string()),
        &AdminHandshake {
            token: token.to_string(),
        },
    )
    .ok()
}

/// Clear any stored admin token so the next admin connection negotiates a
/// fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, services::mailer::LogMailer, state::AppState};

    #[tokio::test]
    async fn only_one_admin_stream_at_a_time() {
        let state = AppState::new(AppConfig::default(), Arc::new(LogMailer));
        let (_rx, token) = subscribe_admin(&state).await.unwrap();
        assert_eq!(token.len(), 32);
        assert!(matches!(
            subscribe_admin(&state).await,
            Err(ServiceError::Unauthorized(_))
        ));

        reset_admin_token(state.clone()).await;
        assert!(subscribe_admin(&state).await.is_ok());
    }

    #[tokio::test]
    async fn greeting_reports_phase_and_degraded_flag() {
        let state = AppState::new(AppConfig::default(), Arc::new(LogMailer));
        let events = greeting_events(&state).await;
        let names: Vec<_> = events.iter().filter_map(|e| e.event.as_deref()).collect();
        assert_eq!(names, vec!["phase_changed", "system_status"]);
        assert!(events[1].data.contains("true"));
    }
}
