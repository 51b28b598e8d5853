//! Length-prefixed framing.
//!
//! A frame is a 2-byte little-endian length followed by exactly that many
//! bytes of JSON-serialized [`Message`].

use crate::Message;

/// Largest body a frame can carry.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;
pub const PREFIX_SIZE: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("message body too large: {len} bytes (max {MAX_BODY_SIZE})")]
    TooLarge { len: usize },
    #[error("json: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("malformed message body: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("malformed frame: prefix declares {declared} bytes, {available} available")]
    MalformedFrame { declared: usize, available: usize },
}

impl Error {
    /// True for failures of the receiving side to make sense of bytes.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedBody(_) | Error::MalformedFrame { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn from_body(body: &[u8]) -> Result<Self, Error> {
        let len = u16::try_from(body.len()).map_err(|_| Error::TooLarge { len: body.len() })?;
        let mut bytes = Vec::with_capacity(PREFIX_SIZE + body.len());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(body);
        Ok(Self(bytes))
    }

    pub fn body(&self) -> &[u8] {
        &self.0[PREFIX_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Body length declared by a length prefix.
pub fn body_len(prefix: [u8; PREFIX_SIZE]) -> usize {
    usize::from(u16::from_le_bytes(prefix))
}

pub fn encode(message: &Message) -> Result<Frame, Error> {
    let body = serde_json::to_vec(message).map_err(Error::Serialize)?;
    Frame::from_body(&body)
}

/// Decode a complete frame, prefix included.
pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
    if bytes.len() < PREFIX_SIZE {
        return Err(Error::MalformedFrame {
            declared: PREFIX_SIZE,
            available: bytes.len(),
        });
    }
    let declared = body_len([bytes[0], bytes[1]]);
    let body = &bytes[PREFIX_SIZE..];
    if body.len() != declared {
        return Err(Error::MalformedFrame {
            declared,
            available: body.len(),
        });
    }
    decode_body(body)
}

pub fn decode_body(body: &[u8]) -> Result<Message, Error> {
    serde_json::from_slice(body).map_err(Error::MalformedBody)
}
