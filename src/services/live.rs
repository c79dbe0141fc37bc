//! Process-local registry of open live (WebSocket) connections, keyed by user id.
//!
//! Each connection is represented by the sending half of an unbounded channel;
//! the WebSocket task owns the receiving half and forwards events to the client.
//! Pushing never waits on the socket: an event is either accepted by the channel
//! or dropped. Nothing is queued for users without a connection.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one connection within a user's channel.
pub type ConnectionId = Uuid;

/// Sending half handed to the registry by the transport.
pub type LiveSender = mpsc::UnboundedSender<LiveEvent>;

/// A named event delivered to a connected client as
/// `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl LiveEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Default)]
pub struct LiveChannelRegistry {
    channels: DashMap<String, HashMap<ConnectionId, LiveSender>>,
}

impl LiveChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the user's channel. The returned id is needed to leave it again.
    pub fn register_connection(&self, user_id: &str, sender: LiveSender) -> ConnectionId {
        let id = Uuid::new_v4();
        self.channels
            .entry(user_id.to_string())
            .or_default()
            .insert(id, sender);
        tracing::debug!("Live connection {} registered for user {}", id, user_id);
        id
    }

    /// Leave the user's channel. Other connections of the same user stay registered.
    pub fn remove_connection(&self, user_id: &str, connection_id: ConnectionId) {
        if let Some(mut conns) = self.channels.get_mut(user_id) {
            conns.remove(&connection_id);
        }
        self.channels.remove_if(user_id, |_, conns| conns.is_empty());
        tracing::debug!(
            "Live connection {} removed for user {}",
            connection_id,
            user_id
        );
    }

    /// Deliver `event` to every open connection of the user. Returns how many
    /// connections accepted it; zero when the user has none. Connections whose
    /// receiver is gone are pruned.
    pub fn push_to_user(&self, user_id: &str, event: &LiveEvent) -> usize {
        let mut delivered = 0;

        if let Some(mut conns) = self.channels.get_mut(user_id) {
            conns.retain(|id, sender| match sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::debug!("Dropping closed live connection {} of user {}", id, user_id);
                    false
                }
            });
        }
        self.channels.remove_if(user_id, |_, conns| conns.is_empty());

        delivered
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.channels.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Drop every registered sender, which ends the forwarding loop of each socket.
    pub fn shutdown(&self) {
        let users = self.channels.len();
        self.channels.clear();
        tracing::info!("Live channel registry cleared ({} user channel(s))", users);
    }
}
