use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::state::room::PlayerId;

/// Identifies one push-channel connection; a player reconnecting gets a fresh one.
pub type ConnectionId = Uuid;

/// Close code sent to a connection replaced by a newer one for the same player.
pub const SUPERSEDED_CLOSE_CODE: u16 = 4000;

#[derive(Clone, Debug)]
/// Handle used to push frames to a connected player.
pub struct PlayerConnection {
    /// Identifier of this particular connection.
    pub id: ConnectionId,
    /// Writer-task channel for the underlying socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Outcome of detaching a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// The connection was the player's live one (or the player had none left).
    Current,
    /// A newer connection replaced this one; nothing changes for the player.
    Superseded,
}

/// Push-channel connections of one room, at most one per player.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: HashMap<PlayerId, PlayerConnection>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tx` as the live connection of `player_id`.
    ///
    /// A previous connection for the same player is closed and dropped.
    pub fn attach(
        &mut self,
        player_id: PlayerId,
        tx: mpsc::UnboundedSender<Message>,
    ) -> ConnectionId {
        let id = Uuid::new_v4();
        if let Some(previous) = self
            .connections
            .insert(player_id, PlayerConnection { id, tx })
        {
            let _ = previous.tx.send(Message::Close(Some(CloseFrame {
                code: SUPERSEDED_CLOSE_CODE,
                reason: Utf8Bytes::from_static("superseded by a newer connection"),
            })));
        }
        id
    }

    /// Forget `connection_id` for `player_id` unless a newer connection replaced it.
    pub fn detach(&mut self, player_id: PlayerId, connection_id: ConnectionId) -> Detach {
        match self.connections.get(&player_id) {
            Some(current) if current.id != connection_id => Detach::Superseded,
            Some(_) => {
                self.connections.remove(&player_id);
                Detach::Current
            }
            None => Detach::Current,
        }
    }

    #[cfg(test)]
    fn is_attached(&self, player_id: &PlayerId) -> bool {
        self.connections.contains_key(player_id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Push a text frame to a single player. Returns `false` when the player is not
    /// reachable; a dead connection is dropped.
    pub fn send_to(&mut self, player_id: PlayerId, text: Utf8Bytes) -> bool {
        let Some(connection) = self.connections.get(&player_id) else {
            return false;
        };
        if connection.tx.send(Message::Text(text)).is_err() {
            warn!(%player_id, "push failed (writer closed); dropping connection");
            self.connections.remove(&player_id);
            return false;
        }
        true
    }

    /// Push a text frame to every connection, best effort.
    ///
    /// A failing connection is dropped and reported without affecting the others.
    pub fn broadcast(&mut self, text: Utf8Bytes) -> Vec<PlayerId> {
        let failed: Vec<PlayerId> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.tx.send(Message::Text(text.clone())).is_err())
            .map(|(player_id, _)| *player_id)
            .collect();

        for player_id in &failed {
            warn!(%player_id, "push failed (writer closed); dropping connection");
            self.connections.remove(player_id);
        }
        failed
    }

    /// Close and forget the connection of `player_id`, if any.
    pub fn close(&mut self, player_id: &PlayerId) -> bool {
        match self.connections.remove(player_id) {
            Some(connection) => {
                let _ = connection.tx.send(Message::Close(None));
                true
            }
            None => false,
        }
    }

    /// Close every connection, e.g. when the room is evicted.
    pub fn close_all(&mut self) {
        for (_, connection) in self.connections.drain() {
            let _ = connection.tx.send(Message::Close(None));
        }
    }
}
