use crate::game::{Game, SessionContext};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tcpgames::{connection, Connection};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

pub type ID = uuid::Uuid;

/// Sent by a session task once its game has finished.
#[derive(Debug)]
pub struct SessionEnded {
    pub id: ID,
    pub players: Vec<Connection>,
    /// Players the game or the scheduler marked as gone.
    pub departed: Vec<connection::ID>,
}

/// The scheduler's side of a running session.
pub struct SessionHandle {
    name: String,
    players: Vec<connection::ID>,
    ctx: SessionContext,
    /// Locked by the task while the game runs.
    game: Arc<Mutex<Box<dyn Game>>>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> ID {
        self.ctx.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn players(&self) -> &[connection::ID] {
        &self.players
    }

    /// Tell the game one of its players is gone. Never blocks.
    pub fn notify_player_left(&self, player: connection::ID) {
        self.ctx.player_left(player);
    }

    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Take the players back from a task that ended without reporting, such
    /// as one whose game panicked.
    pub fn recover_players(&self) -> Vec<Connection> {
        if !self.task.is_finished() {
            return Vec::new();
        }
        self.game
            .try_lock()
            .map(|mut game| game.release_players())
            .unwrap_or_default()
    }

    /// Stop the task at its next await point and take back its players. Gives
    /// up, returning nothing, if the task has not wound down within `wait`.
    pub async fn abort(mut self, wait: Duration) -> Vec<Connection> {
        self.task.abort();
        if tokio::time::timeout(wait, &mut self.task).await.is_err() {
            tracing::warn!(session = %self.id(), "\"{}\" game did not unwind after abort", self.name);
            return Vec::new();
        }
        self.game
            .try_lock()
            .map(|mut game| game.release_players())
            .unwrap_or_default()
    }
}

/// Run `game` on its own task. The task reports back on `events` when the
/// game returns.
pub fn spawn(
    game: Box<dyn Game>,
    players: Vec<connection::ID>,
    ctx: SessionContext,
    events: mpsc::UnboundedSender<SessionEnded>,
) -> SessionHandle {
    let name = game.name().to_owned();
    let game = Arc::new(Mutex::new(game));
    let task = {
        let ctx = ctx.clone();
        let name = name.clone();
        let game = game.clone();
        tokio::spawn(async move {
            let mut game = game.lock().await;
            tracing::info!(session = %ctx.id(), "Starting a \"{}\" game.", name);
            game.run(&ctx).await;
            tracing::info!(session = %ctx.id(), "Ending a \"{}\" game.", name);
            let ended = SessionEnded {
                id: ctx.id(),
                players: game.release_players(),
                departed: ctx.departed(),
            };
            if events.send(ended).is_err() {
                tracing::debug!(session = %ctx.id(), "scheduler is gone, dropping players");
            }
        })
    };
    SessionHandle {
        name,
        players,
        ctx,
        game,
        task,
    }
}

/// Running sessions and the connection → session index.
#[derive(Default)]
pub struct Sessions {
    running: HashMap<ID, SessionHandle>,
    index: HashMap<connection::ID, ID>,
}

impl Sessions {
    pub fn insert(&mut self, handle: SessionHandle) {
        for player in handle.players() {
            self.index.insert(*player, handle.id());
        }
        self.running.insert(handle.id(), handle);
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    pub fn session_of(&self, player: connection::ID) -> Option<ID> {
        self.index.get(&player).copied()
    }

    pub fn get(&self, id: ID) -> Option<&SessionHandle> {
        self.running.get(&id)
    }

    /// Route a disconnect to the session holding `player`. Returns false if no
    /// session holds it.
    pub fn notify_player_left(&self, player: connection::ID) -> bool {
        match self.session_of(player).and_then(|id| self.running.get(&id)) {
            Some(handle) => {
                handle.notify_player_left(player);
                true
            }
            None => false,
        }
    }

    /// Forget a session and its index entries.
    pub fn remove(&mut self, id: ID) -> Option<SessionHandle> {
        let handle = self.running.remove(&id)?;
        for player in handle.players() {
            self.index.remove(player);
        }
        Some(handle)
    }

    /// Sessions whose task is done, with or without having reported back.
    pub fn finished(&self) -> Vec<ID> {
        self.running
            .values()
            .filter(|handle| handle.is_finished())
            .map(SessionHandle::id)
            .collect()
    }

    /// Mark every player as gone and ask every session to stop.
    pub fn cancel_all(&self) {
        for handle in self.running.values() {
            for player in handle.players() {
                handle.notify_player_left(*player);
            }
            handle.cancel();
        }
    }

    pub fn drain(&mut self) -> Vec<SessionHandle> {
        self.index.clear();
        self.running.drain().map(|(_, handle)| handle).collect()
    }
}
