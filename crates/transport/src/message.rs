//! Messages exchanged with the attached process
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Runtime index the target assigns to a loaded script
pub type ScriptIndex = i64;

/// Line number in the target's own numbering
pub type Line = u32;

/// Messages emitted by the attached process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProtocolMessage {
    /// Informational message, carries no session state
    Info {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The target has compiled a script and blocks until it receives [`Command::Done`]
    ScriptLoaded { name: String, index: ScriptIndex },
    /// The target terminated or detached
    SessionEnded,
    /// Execution paused at the given location
    BreakHit { name: String, line: Line },
}

impl ProtocolMessage {
    /// Decode the body of a single wire unit
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let content = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;
        serde_json::from_str(content).map_err(DecodeError::Json)
    }

    /// Encode this message as a complete framed unit
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("Content-Length: {}\r\n\r\n{}", json.len(), json).into_bytes())
    }
}

/// Commands understood by the attached process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StepOver,
    StepInto,
    SetBreakpoint { script: ScriptIndex, line: Line },
    Done,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StepOver => f.write_str("stepover"),
            Command::StepInto => f.write_str("stepinto"),
            Command::SetBreakpoint { script, line } => write!(f, "setb {script} {line}"),
            Command::Done => f.write_str("done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_each_kind() {
        let cases = [
            (
                r#"{"type":"info","message":"hello"}"#,
                ProtocolMessage::Info {
                    message: Some("hello".to_string()),
                },
            ),
            (r#"{"type":"info"}"#, ProtocolMessage::Info { message: None }),
            (
                r#"{"type":"scriptLoaded","name":"@main.lua","index":3}"#,
                ProtocolMessage::ScriptLoaded {
                    name: "@main.lua".to_string(),
                    index: 3,
                },
            ),
            (r#"{"type":"sessionEnded"}"#, ProtocolMessage::SessionEnded),
            (
                r#"{"type":"breakHit","name":"main.lua","line":12}"#,
                ProtocolMessage::BreakHit {
                    name: "main.lua".to_string(),
                    line: 12,
                },
            ),
        ];

        for (body, expected) in cases {
            let message = ProtocolMessage::decode(body.as_bytes()).expect("decoding message");
            assert_eq!(message, expected, "decoding {body}");
        }
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        let err = ProtocolMessage::decode(br#"{"type":"variables","frame":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = ProtocolMessage::decode(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8));
    }

    #[test]
    fn command_text() {
        assert_eq!(Command::StepOver.to_string(), "stepover");
        assert_eq!(Command::StepInto.to_string(), "stepinto");
        assert_eq!(
            Command::SetBreakpoint { script: 4, line: 27 }.to_string(),
            "setb 4 27"
        );
        assert_eq!(Command::Done.to_string(), "done");
    }
}
