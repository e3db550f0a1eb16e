use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{services::room_service, state::SharedState};

/// Close code sent when the socket path names an unknown room or player.
pub const INVALID_ROOM_OR_PLAYER_CLOSE_CODE: u16 = 4001;

/// Handle the full lifecycle of one player's push channel.
///
/// The channel is server-to-client only: inbound text frames are treated as keep-alives,
/// every mutation goes through the REST control surface.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    room_code: String,
    player_id: String,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps pushes flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let session = match room_service::connect_player(
        &state,
        &room_code,
        &player_id,
        outbound_tx.clone(),
    )
    .await
    {
        Ok(session) => session,
        Err(err) => {
            warn!(room = %room_code, player_id = %player_id, error = %err, "rejecting push channel");
            let _ = outbound_tx.send(Message::Close(Some(CloseFrame {
                code: INVALID_ROOM_OR_PLAYER_CLOSE_CODE,
                reason: Utf8Bytes::from_static("Invalid room or player"),
            })));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(room = %session.code, player_id = %session.player_id, payload = %text, "ignoring inbound text frame");
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(room = %session.code, player_id = %session.player_id, "push channel closed by client");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room = %session.code, player_id = %session.player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::disconnect_player(&state, &session).await;
    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
