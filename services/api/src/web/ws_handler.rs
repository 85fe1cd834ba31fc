//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket transport for live conversation sessions. Each connection
//! serves one conversation and processes client messages strictly in
//! arrival order; a failed message produces an error frame and leaves the
//! connection open.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use lingua_core::ports::PortError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<Uuid>,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, conversation_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, conversation_id: Uuid) {
    info!("WebSocket session opened for conversation {}", conversation_id);
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                if handle_text_frame(text.as_str(), &app_state, conversation_id, &mut sender)
                    .await
                    .is_err()
                {
                    // The send side is gone; nothing left to report to.
                    break;
                }
            }
            Message::Close(_) => {
                info!("Client closed conversation {} session", conversation_id);
                break;
            }
            _ => {}
        }
    }

    info!("WebSocket session ended for conversation {}", conversation_id);
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

/// Processes one inbound text frame end to end. `Err` means the socket
/// itself failed; per-message failures are reported in-band and return `Ok`.
async fn handle_text_frame(
    raw: &str,
    app_state: &Arc<AppState>,
    conversation_id: Uuid,
    sender: &mut SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    let client_msg = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Unparsable client frame on conversation {}: {}", conversation_id, e);
            return send(
                sender,
                &ServerMessage::Error { message: format!("Unrecognized message: {}", e) },
            )
            .await;
        }
    };

    let (user_text, language) = match client_msg {
        ClientMessage::Text { data, language } => (data, language),
        ClientMessage::Audio { data, language } => {
            let audio = match BASE64.decode(data.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Bad base64 audio on conversation {}: {}", conversation_id, e);
                    return send(
                        sender,
                        &ServerMessage::Error {
                            message: "Audio payload is not valid base64.".to_string(),
                        },
                    )
                    .await;
                }
            };

            let transcript = match app_state.stt_adapter.transcribe(&audio, &language).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Transcription failed on conversation {}: {:?}", conversation_id, e);
                    return send(
                        sender,
                        &ServerMessage::Error {
                            message: "Could not transcribe the audio.".to_string(),
                        },
                    )
                    .await;
                }
            };

            send(sender, &ServerMessage::Transcript { text: transcript.clone() }).await?;
            (transcript, language)
        }
    };

    // Blank input (an empty text frame, or silence that transcribes to
    // nothing) is not a turn.
    if !is_submittable(&user_text) {
        return Ok(());
    }

    let reply = match app_state.conversations.submit_turn(conversation_id, &user_text).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Turn submission failed on conversation {}: {:?}", conversation_id, e);
            return send(sender, &ServerMessage::Error { message: turn_error_message(&e) }).await;
        }
    };

    // Synthesis is best-effort: a voice outage degrades to a text-only reply.
    let audio = match app_state.tts_adapter.synthesize(&reply.reply, &language).await {
        Ok(bytes) => Some(BASE64.encode(bytes)),
        Err(e) => {
            warn!(
                "Speech synthesis failed on conversation {}, replying text-only: {:?}",
                conversation_id, e
            );
            None
        }
    };

    send(sender, &ServerMessage::Reply { text: reply.reply, audio }).await
}

fn is_submittable(text: &str) -> bool {
    !text.trim().is_empty()
}

fn turn_error_message(error: &PortError) -> String {
    match error {
        PortError::NotFound(_) => "Conversation not found.".to_string(),
        PortError::ConversationClosed(_) => {
            "This conversation has ended and no longer accepts messages.".to_string()
        }
        PortError::UpstreamGeneration(_) | PortError::MalformedGeneration(_) => {
            "The tutor could not produce a reply. Please try again.".to_string()
        }
        PortError::Unexpected(_) => "An internal error occurred.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_not_a_turn() {
        assert!(!is_submittable(""));
        assert!(!is_submittable("   \n\t"));
        assert!(is_submittable("Bonjour!"));
    }

    #[test]
    fn turn_errors_map_to_client_safe_messages() {
        let closed = turn_error_message(&PortError::ConversationClosed(Uuid::new_v4()));
        assert!(closed.contains("ended"));

        let unexpected = turn_error_message(&PortError::Unexpected("pool exhausted".to_string()));
        assert!(!unexpected.contains("pool"));
    }
}
