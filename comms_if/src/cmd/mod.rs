//! # Command module
//!
//! Movement commands sent by the remote agent to the rover, and the requests the rover sends to
//! the agent.
//!
//! The agent answers a request with a JSON frame of the form:
//!
//! ```text
//! {"move": {"x": 1.0, "y": 0.0, "z": 0.0}}
//! ```
//!
//! Anything else (no `move` field, bad JSON, non UTF-8 bytes, a frame cut in half by the
//! transport) is not an error for the rover, it simply carries no command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Request token asking the agent for a movement command.
pub const MOVE_REQUEST: &str = "request_move";

/// Prefix of a physics detection request.
pub const PHYSICS_DETECTION_PREFIX: &str = "PhysicsDetection:";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A 3D vector as it appears on the wire.
///
/// Missing components default to zero.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorData {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// The frame sent by the agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveFrame {
    /// The velocity change to apply, `None` if the frame carries no movement.
    #[serde(rename = "move", default)]
    pub move_vec: Option<VectorData>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A decoded command from the agent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CommandMessage {
    /// Apply the vector as an instantaneous velocity change.
    MoveVector(VectorData),

    /// The frame did not contain a usable command.
    Unknown,
}

/// The kind of a [`CommandMessage`], without its data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandKind {
    MoveVector,
    Unknown,
}

/// A request sent from the rover to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Ask for a movement command.
    Move,

    /// Describe the physics engine the rover is simulated in.
    PhysicsDetection {
        name: String,
        force_n: f64,
        friction: f64,
        gravity: f64,
    },

    /// Free text distress message.
    Sos(String),
}

/// Reasons a frame could not be decoded into a command.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("The frame is not valid UTF-8")]
    NonUtf8,

    #[error("The frame is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("The frame does not contain a \"move\" field")]
    NoMove,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VectorData {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl MoveFrame {
    pub fn new(move_vec: VectorData) -> Self {
        Self {
            move_vec: Some(move_vec),
        }
    }

    /// Serialize the frame into the JSON sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl CommandMessage {
    /// Decode a command from the raw bytes of a frame.
    pub fn try_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let frame_str = std::str::from_utf8(bytes).map_err(|_| DecodeError::NonUtf8)?;

        let frame: MoveFrame =
            serde_json::from_str(frame_str.trim()).map_err(DecodeError::InvalidJson)?;

        match frame.move_vec {
            Some(v) => Ok(CommandMessage::MoveVector(v)),
            None => Err(DecodeError::NoMove),
        }
    }

    /// Decode a command, mapping any failure to [`CommandMessage::Unknown`].
    pub fn decode(bytes: &[u8]) -> Self {
        Self::try_decode(bytes).unwrap_or(CommandMessage::Unknown)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            CommandMessage::MoveVector(_) => CommandKind::MoveVector,
            CommandMessage::Unknown => CommandKind::Unknown,
        }
    }

    /// The vector carried by the command, if any.
    pub fn vector(&self) -> Option<VectorData> {
        match self {
            CommandMessage::MoveVector(v) => Some(*v),
            CommandMessage::Unknown => None,
        }
    }
}

impl Request {
    /// The ASCII payload sent on the wire for this request.
    pub fn to_payload(&self) -> String {
        match self {
            Request::Move => MOVE_REQUEST.to_string(),
            Request::PhysicsDetection {
                name,
                force_n,
                friction,
                gravity,
            } => format!(
                "{} name={}; force={}N; friction={};gravity={}",
                PHYSICS_DETECTION_PREFIX, name, force_n, friction, gravity
            ),
            Request::Sos(msg) => msg.clone(),
        }
    }

    /// Interpret a payload recieved by the agent.
    ///
    /// Unparsable physics detection values are read as zero, anything which isn't a move or
    /// physics detection request is an SOS message.
    pub fn parse(payload: &str) -> Self {
        let payload = payload.trim();

        if payload == MOVE_REQUEST {
            return Request::Move;
        }

        if let Some(body) = payload.strip_prefix(PHYSICS_DETECTION_PREFIX) {
            let mut name = String::new();
            let mut force_n = 0.0;
            let mut friction = 0.0;
            let mut gravity = 0.0;

            for field in body.split(';') {
                let mut kv = field.splitn(2, '=');
                let key = kv.next().unwrap_or("").trim();
                let val = kv.next().unwrap_or("").trim();

                match key {
                    "name" => name = val.to_string(),
                    "force" => force_n = val.trim_end_matches('N').parse().unwrap_or(0.0),
                    "friction" => friction = val.parse().unwrap_or(0.0),
                    "gravity" => gravity = val.parse().unwrap_or(0.0),
                    _ => (),
                }
            }

            return Request::PhysicsDetection {
                name,
                force_n,
                friction,
                gravity,
            };
        }

        Request::Sos(payload.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_move() {
        let cmd = CommandMessage::decode(br#"{"move":{"x":1,"y":0,"z":0}}"#);
        assert_eq!(cmd, CommandMessage::MoveVector(VectorData::new(1.0, 0.0, 0.0)));
        assert_eq!(cmd.kind(), CommandKind::MoveVector);

        // Trailing newline and missing components are tolerated
        let cmd = CommandMessage::decode(b"{\"move\": {\"y\": -2.5}}\n");
        assert_eq!(cmd.vector(), Some(VectorData::new(0.0, -2.5, 0.0)));
    }

    #[test]
    fn test_decode_no_command() {
        assert_eq!(CommandMessage::decode(b"garbage"), CommandMessage::Unknown);
        assert_eq!(CommandMessage::decode(b""), CommandMessage::Unknown);
        assert_eq!(CommandMessage::decode(br#"{"mission_type":"rescue"}"#).kind(), CommandKind::Unknown);
        assert_eq!(CommandMessage::decode(br#"{"move":null}"#), CommandMessage::Unknown);

        // Half a frame
        assert_eq!(CommandMessage::decode(br#"{"move":{"x":1,"#), CommandMessage::Unknown);

        assert!(matches!(
            CommandMessage::try_decode(&[0xff, 0xfe, 0x00]),
            Err(DecodeError::NonUtf8)
        ));
        assert!(matches!(
            CommandMessage::try_decode(br#"{"notes":"x"}"#),
            Err(DecodeError::NoMove)
        ));
    }

    #[test]
    fn test_move_frame_json() {
        let json = MoveFrame::new(VectorData::new(1000.0, 0.0, 0.0)).to_json().unwrap();
        assert_eq!(json, r#"{"move":{"x":1000.0,"y":0.0,"z":0.0}}"#);
        assert_eq!(
            CommandMessage::decode(json.as_bytes()).vector(),
            Some(VectorData::new(1000.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_requests() {
        assert_eq!(Request::Move.to_payload(), "request_move");
        assert_eq!(Request::parse("request_move\n"), Request::Move);

        let req = Request::PhysicsDetection {
            name: "SimBody".into(),
            force_n: 0.5,
            friction: 0.05,
            gravity: -9.81,
        };
        let payload = req.to_payload();
        assert_eq!(
            payload,
            "PhysicsDetection: name=SimBody; force=0.5N; friction=0.05;gravity=-9.81"
        );
        assert_eq!(Request::parse(&payload), req);

        assert_eq!(
            Request::parse("rover is stuck"),
            Request::Sos("rover is stuck".into())
        );
    }
}
