use crate::game::{AdmissionConflict, Game};
use std::collections::VecDeque;
use tcpgames::{connection, Connection};

/// Connections waiting for a game, longest-waiting first.
#[derive(Debug, Default)]
pub struct Lobby {
    waiting: VecDeque<Connection>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn push_back(&mut self, connection: Connection) {
        self.waiting.push_back(connection);
    }

    pub fn pop_front(&mut self) -> Option<Connection> {
        self.waiting.pop_front()
    }

    pub fn contains(&self, id: connection::ID) -> bool {
        self.waiting.iter().any(|connection| connection.id() == id)
    }

    pub fn remove(&mut self, id: connection::ID) -> Option<Connection> {
        let position = self
            .waiting
            .iter()
            .position(|connection| connection.id() == id)?;
        self.waiting.remove(position)
    }

    pub fn ids(&self) -> Vec<connection::ID> {
        self.waiting.iter().map(Connection::id).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.waiting.iter_mut()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Connection> + '_ {
        self.waiting.drain(..)
    }

    /// Offer waiting connections to `game`, oldest first, until `wanted` have
    /// been admitted. A rejected connection goes to the back of the line. Each
    /// connection is offered at most once per call, so a game that keeps
    /// rejecting cannot stall the caller.
    ///
    /// Returns the ids of the admitted connections.
    pub fn offer(&mut self, game: &mut dyn Game, wanted: usize) -> Vec<connection::ID> {
        let mut admitted = Vec::with_capacity(wanted);
        for _ in 0..self.waiting.len() {
            if admitted.len() == wanted {
                break;
            }
            let Some(connection) = self.waiting.pop_front() else {
                break;
            };
            let id = connection.id();
            match game.admit_player(connection) {
                Ok(()) => admitted.push(id),
                Err(AdmissionConflict(connection)) => {
                    tracing::debug!(peer = %connection.peer(), "{} rejected player, requeueing", game.name());
                    self.waiting.push_back(connection);
                }
            }
        }
        admitted
    }
}
