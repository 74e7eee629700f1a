use tokio::sync::{Mutex, broadcast};

use crate::dto::sse::ServerEvent;

/// Public and admin SSE hubs plus the admin token guard.
pub struct SseState {
    public: SseHub,
    admin: SseHub,
    admin_token: Mutex<Option<String>>,
}

impl SseState {
    /// Build both hubs with per-stream channel capacities.
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: SseHub::new(admin_capacity),
            admin_token: Mutex::new(None),
        }
    }

    /// Hub fanning out events to every frontend (teams, projector).
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Hub reserved for the instructor panel.
    pub fn admin(&self) -> &SseHub {
        &self.admin
    }

    /// Token held by the connected instructor panel, if any.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        &self.admin_token
    }
}

/// Broadcast channel wrapper shared by the SSE routes.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers; dropped when nobody listens.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
