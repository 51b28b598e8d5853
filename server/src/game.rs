//! The contract a pluggable game implements.

use async_trait::async_trait;
use dashmap::DashSet;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tcpgames::{connection, Connection};

/// Returned by [`Game::admit_player`] when the game will not take a player.
/// The connection is handed back so the caller can requeue it.
#[derive(Debug, thiserror::Error)]
#[error("game rejected player {}", .0.peer())]
pub struct AdmissionConflict(pub Connection);

#[async_trait]
pub trait Game: Send {
    fn name(&self) -> &str;

    /// Players needed before the game can start. At least one.
    fn required_players(&self) -> usize;

    /// Take ownership of a player. Fails once the game is full.
    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict>;

    /// The game loop. Runs on its own task until the game concludes, a player
    /// leaves, or [`SessionContext::should_stop`] turns true. Implementations
    /// check the context at least once per polling pass.
    async fn run(&mut self, ctx: &SessionContext);

    /// Hand back every player connection still held.
    fn release_players(&mut self) -> Vec<Connection>;
}

/// Produces one fresh game per formed session.
pub type GameFactory = Box<dyn Fn() -> Box<dyn Game> + Send + Sync>;

/// Signals shared between a running game and the scheduler.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: crate::session::ID,
    cancelled: Arc<AtomicBool>,
    departed: Arc<DashSet<connection::ID>>,
    poll_interval: Duration,
    probe_timeout: Duration,
}

impl SessionContext {
    pub fn new(id: crate::session::ID, poll_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            departed: Arc::new(DashSet::new()),
            poll_interval,
            probe_timeout,
        }
    }

    pub fn id(&self) -> crate::session::ID {
        self.id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn has_left(&self, player: connection::ID) -> bool {
        self.departed.contains(&player)
    }

    /// Mark a player as gone. Called by the scheduler when it learns of a
    /// disconnect, and by the game itself when it sees one. Never blocks.
    pub fn player_left(&self, player: connection::ID) {
        self.departed.insert(player);
    }

    pub fn departed(&self) -> Vec<connection::ID> {
        self.departed.iter().map(|id| *id).collect()
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Sleep for one polling interval.
    pub async fn pause(&self) {
        tokio::time::sleep(self.poll_interval).await;
    }
}
