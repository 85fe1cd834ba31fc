//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for voice/text conversation streaming. Audio travels base64-encoded inside
//! JSON text frames in both directions.

use serde::{Deserialize, Serialize};

fn default_language() -> String {
    "en".to_string()
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A spoken utterance: base64-encoded audio to be transcribed and then
    /// submitted as a conversation turn.
    Audio {
        data: String,
        #[serde(default = "default_language")]
        language: String,
    },

    /// A typed utterance, submitted as a conversation turn directly.
    Text {
        data: String,
        #[serde(default = "default_language")]
        language: String,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The transcription of an audio message, emitted before the tutor
    /// reply is generated.
    Transcript { text: String },

    /// The tutor's reply. `audio` carries base64-encoded synthesized
    /// speech and is omitted when synthesis failed or was skipped.
    Reply {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
    },

    /// Reports a per-message failure. The channel stays open afterwards.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_deserialize_from_tagged_json() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"text","data":"Bonjour!","language":"fr"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Text { ref data, ref language }
            if data == "Bonjour!" && language == "fr"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"audio","data":"AAAA"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Audio { ref language, .. } if language == "en"));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"video","data":""}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json at all").is_err());
    }

    #[test]
    fn reply_omits_audio_field_when_synthesis_was_skipped() {
        let with = serde_json::to_string(&ServerMessage::Reply {
            text: "Salut!".to_string(),
            audio: Some("QUJD".to_string()),
        })
        .unwrap();
        assert!(with.contains("\"audio\""));

        let without = serde_json::to_string(&ServerMessage::Reply {
            text: "Salut!".to_string(),
            audio: None,
        })
        .unwrap();
        assert!(!without.contains("\"audio\""));
        assert!(without.contains("\"type\":\"reply\""));
    }
}
