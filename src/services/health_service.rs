use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health and buzzer connectivity, logging storage issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.quiz_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let connected = state.buzzers().len();
    let subscribers =
        state.public_sse().subscriber_count() + state.admin_sse().subscriber_count();
    if state.is_degraded() {
        HealthResponse::degraded(connected, subscribers)
    } else {
        HealthResponse::ok(connected, subscribers)
    }
}
