//! # Framing
//!
//! Splits the inbound byte stream into frames.
//!
//! The agent protocol has no framing of its own: whatever one read returns is treated as one
//! frame ([`Framing::Raw`]). Under real network conditions a frame may be split across reads or
//! two frames merged in one read, which the decoder then sees as garbage. [`Framing::LengthPrefixed`]
//! prefixes each frame with its length as a big endian `u32`, and must be enabled on both ends.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::warn;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of bytes in a length prefix.
pub const PREFIX_LEN: usize = 4;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The framing scheme used on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Each read is one frame.
    Raw,

    /// Each frame is preceded by its length as a big endian `u32`.
    LengthPrefixed,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Accumulates bytes read from a stream and yields complete frames.
pub struct FrameDecoder {
    framing: Framing,

    /// Frames longer than this are discarded.
    max_frame_len: usize,

    buf: Vec<u8>,

    /// Number of bytes of an oversize frame still to be discarded.
    skip: usize,

    num_discarded: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Framing {
    fn default() -> Self {
        Framing::Raw
    }
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame_len: usize) -> Self {
        Self {
            framing,
            max_frame_len,
            buf: Vec::new(),
            skip: 0,
            num_discarded: 0,
        }
    }

    /// Push newly read bytes into the decoder, returning all frames completed by them in the
    /// order they were sent.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        match self.framing {
            Framing::Raw => {
                if bytes.is_empty() {
                    vec![]
                } else {
                    vec![bytes.to_vec()]
                }
            }
            Framing::LengthPrefixed => self.push_prefixed(bytes),
        }
    }

    /// Number of oversize frames which have been discarded.
    pub fn num_discarded(&self) -> usize {
        self.num_discarded
    }

    fn push_prefixed(&mut self, mut bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        // Drop the rest of any oversize frame
        if self.skip > 0 {
            let n = self.skip.min(bytes.len());
            self.skip -= n;
            bytes = &bytes[n..];
        }

        self.buf.extend_from_slice(bytes);

        while self.buf.len() >= PREFIX_LEN {
            let frame_len = BigEndian::read_u32(&self.buf[..PREFIX_LEN]) as usize;

            if frame_len > self.max_frame_len {
                warn!(
                    "Discarding {} byte frame, larger than the {} byte limit",
                    frame_len, self.max_frame_len
                );
                self.num_discarded += 1;

                let available = self.buf.len() - PREFIX_LEN;
                if available >= frame_len {
                    self.buf.drain(..PREFIX_LEN + frame_len);
                    continue;
                } else {
                    self.skip = frame_len - available;
                    self.buf.clear();
                    break;
                }
            }

            if self.buf.len() < PREFIX_LEN + frame_len {
                break;
            }

            frames.push(self.buf[PREFIX_LEN..PREFIX_LEN + frame_len].to_vec());
            self.buf.drain(..PREFIX_LEN + frame_len);
        }

        frames
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode a payload into the bytes to write for the given framing.
pub fn encode_frame(framing: Framing, payload: &[u8]) -> Vec<u8> {
    match framing {
        Framing::Raw => payload.to_vec(),
        Framing::LengthPrefixed => {
            let mut bytes = Vec::with_capacity(PREFIX_LEN + payload.len());
            // Writing into a Vec cannot fail
            bytes.write_u32::<BigEndian>(payload.len() as u32).ok();
            bytes.extend_from_slice(payload);
            bytes
        }
    }
}
