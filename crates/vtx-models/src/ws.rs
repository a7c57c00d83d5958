//! WebSocket message types for the live job channel.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::event::TranscodeEvent;
use crate::job::JobId;

/// Messages a client sends over the live channel.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room for one job
    Subscribe {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },

    /// Leave a previously joined room
    Unsubscribe {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
}

/// Messages the server sends back.
///
/// Progress events are relayed in their wire form; the variants here cover
/// the subscription handshake and channel-level errors.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription acknowledged
    Subscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },

    /// Unsubscription acknowledged
    Unsubscribed {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },

    /// Relayed progress event
    Event(TranscodeEvent),

    /// Channel-level error (bad message, unknown job)
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parses_subscribe() {
        let json = r#"{"type": "subscribe", "jobId": "j1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Subscribe { job_id } => assert_eq!(job_id.as_str(), "j1"),
            _ => panic!("expected subscribe"),
        }
    }

    #[test]
    fn test_client_message_rejects_unknown_type() {
        let json = r#"{"type": "ping"}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_event_keeps_event_wire_form() {
        let msg = ServerMessage::Event(TranscodeEvent::info(JobId::from_string("j1"), "hello"));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"jobId\":\"j1\""));
        assert!(json.contains("\"logLevel\":\"INFO\""));
    }

    #[test]
    fn test_server_ack_wire_form() {
        let msg = ServerMessage::Subscribed {
            job_id: JobId::from_string("j2"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"subscribed\""));
        assert!(json.contains("\"jobId\":\"j2\""));
    }
}
