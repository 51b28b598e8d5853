//! Lobby and session scheduling for turn-based text games.
//!
//! [`Server`] accepts connections into a [`lobby::Lobby`], hands them to a
//! fresh [`game::Game`] once enough are waiting, and runs every formed session
//! on its own task. Everything shared between connections is owned by the
//! scheduler loop; sessions talk back through [`session::SessionEnded`]
//! events and the flags in [`game::SessionContext`].

pub mod config;
pub mod game;
pub mod games;
pub mod lobby;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ServerConfig;
pub use game::{AdmissionConflict, Game, GameFactory, SessionContext};
pub use server::{Server, ServerHandle, State};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io: {0}")]
    IO(#[from] std::io::Error),
}
