//! Conferencing widget events.
//!
//! The provider's duck-typed event payloads are mapped into explicit tagged
//! variants at the boundary and validated on receipt; malformed payloads
//! never reach the controller.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Joined,
    Left,
    ParticipantJoined { id: String, name: Option<String> },
    ParticipantLeft { id: String },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    event: String,
    #[serde(default)]
    participant: Option<WireParticipant>,
    #[serde(default, rename = "errorMsg")]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireParticipant {
    id: String,
    #[serde(default)]
    user_name: Option<String>,
}

impl CallEvent {
    /// Parse one provider event payload.
    pub fn from_wire(raw: &str) -> Result<CallEvent> {
        let wire: WireEvent =
            serde_json::from_str(raw).context("Unparseable widget event payload")?;

        match wire.event.as_str() {
            "joined-meeting" => Ok(CallEvent::Joined),
            "left-meeting" => Ok(CallEvent::Left),
            "participant-joined" => {
                let p = wire
                    .participant
                    .context("participant-joined event without participant")?;
                Ok(CallEvent::ParticipantJoined {
                    id: p.id,
                    name: p.user_name,
                })
            }
            "participant-left" => {
                let p = wire
                    .participant
                    .context("participant-left event without participant")?;
                Ok(CallEvent::ParticipantLeft { id: p.id })
            }
            "error" => Ok(CallEvent::Error {
                message: wire
                    .error_msg
                    .unwrap_or_else(|| "Unknown call error".to_string()),
            }),
            other => bail!("Unknown widget event kind: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_lifecycle_events() {
        assert_eq!(
            CallEvent::from_wire(r#"{"event": "joined-meeting"}"#).unwrap(),
            CallEvent::Joined
        );
        assert_eq!(
            CallEvent::from_wire(r#"{"event": "left-meeting"}"#).unwrap(),
            CallEvent::Left
        );
    }

    #[test]
    fn test_parses_participant_events() {
        let ev = CallEvent::from_wire(
            r#"{"event": "participant-joined", "participant": {"id": "p9", "user_name": "Dr. Rao"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            CallEvent::ParticipantJoined {
                id: "p9".to_string(),
                name: Some("Dr. Rao".to_string())
            }
        );

        let ev =
            CallEvent::from_wire(r#"{"event": "participant-left", "participant": {"id": "p9"}}"#)
                .unwrap();
        assert_eq!(ev, CallEvent::ParticipantLeft { id: "p9".to_string() });
    }

    #[test]
    fn test_error_event_defaults_message() {
        let ev = CallEvent::from_wire(r#"{"event": "error"}"#).unwrap();
        assert_eq!(
            ev,
            CallEvent::Error {
                message: "Unknown call error".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert!(CallEvent::from_wire("not json").is_err());
        assert!(CallEvent::from_wire(r#"{"event": "participant-joined"}"#).is_err());
        assert!(CallEvent::from_wire(r#"{"event": "screen-share-started"}"#).is_err());
    }
}
