//! Wire protocol shared by the games server and its clients.
//!
//! A [`Message`] travels as one length-prefixed [`codec::Frame`] over a
//! [`connection::Connection`]. [`probe`] tells a silently closed peer apart
//! from an idle one.

pub mod codec;
pub mod connection;
pub mod probe;

pub use connection::Connection;

pub const PORT: u16 = 6000;

use serde::{Deserialize, Serialize};

/// Commands understood by both peers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Command {
    /// Informational text, no reply expected.
    Message,
    /// A prompt; the recipient answers with an `input` message.
    Input,
    /// Graceful termination notice, either direction.
    Bye,
}

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Message => "message",
            Command::Input => "input",
            Command::Bye => "bye",
        }
    }

    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "message" => Some(Command::Message),
            "input" => Some(Command::Input),
            "bye" => Some(Command::Bye),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol message. The command is kept as a string so frames carrying
/// commands this crate does not know survive a decode/encode cycle.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    command: String,
    #[serde(rename = "message", alias = "payload", default)]
    payload: String,
}

impl Message {
    pub fn new(command: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            payload: payload.into(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::new(Command::Message.as_str(), text)
    }

    pub fn input(prompt: impl Into<String>) -> Self {
        Self::new(Command::Input.as_str(), prompt)
    }

    pub fn bye(reason: impl Into<String>) -> Self {
        Self::new(Command::Bye.as_str(), reason)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The recognized command, or `None` for anything else.
    pub fn kind(&self) -> Option<Command> {
        Command::parse(&self.command)
    }

    pub fn is(&self, command: Command) -> bool {
        self.kind() == Some(command)
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}
