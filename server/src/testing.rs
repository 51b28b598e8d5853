//! Loopback connections and small games for the unit tests.

use crate::game::{AdmissionConflict, Game, SessionContext};
use async_trait::async_trait;
use std::time::Duration;
use tcpgames::{connection, probe, Connection};
use tokio::net::{TcpListener, TcpStream};

/// A server-side connection and the raw client stream on the other end.
pub(crate) async fn connection() -> (Connection, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (stream, _) = accepted.unwrap();
    (Connection::new(stream).unwrap(), client.unwrap())
}

/// Seats up to `capacity` players and waits until cancelled or one leaves.
pub(crate) struct Table {
    capacity: usize,
    players: Vec<Connection>,
}

impl Table {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            players: Vec::new(),
        }
    }

    pub(crate) fn player_ids(&self) -> Vec<connection::ID> {
        self.players.iter().map(Connection::id).collect()
    }
}

#[async_trait]
impl Game for Table {
    fn name(&self) -> &str {
        "Table"
    }

    fn required_players(&self) -> usize {
        self.capacity
    }

    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict> {
        if self.players.len() >= self.capacity {
            return Err(AdmissionConflict(connection));
        }
        self.players.push(connection);
        Ok(())
    }

    async fn run(&mut self, ctx: &SessionContext) {
        while !ctx.should_stop() {
            for player in &self.players {
                if probe::is_disconnected(player, ctx.probe_timeout()).await {
                    ctx.player_left(player.id());
                }
            }
            if self.players.iter().any(|player| ctx.has_left(player.id())) {
                return;
            }
            ctx.pause().await;
        }
    }

    fn release_players(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.players)
    }
}

/// A [`Table`] that refuses one particular connection.
pub(crate) struct Picky {
    refused: connection::ID,
    table: Table,
}

impl Picky {
    pub(crate) fn rejecting(refused: connection::ID, capacity: usize) -> Self {
        Self {
            refused,
            table: Table::new(capacity),
        }
    }
}

#[async_trait]
impl Game for Picky {
    fn name(&self) -> &str {
        "Picky"
    }

    fn required_players(&self) -> usize {
        self.table.required_players()
    }

    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict> {
        if connection.id() == self.refused {
            return Err(AdmissionConflict(connection));
        }
        self.table.admit_player(connection)
    }

    async fn run(&mut self, ctx: &SessionContext) {
        self.table.run(ctx).await
    }

    fn release_players(&mut self) -> Vec<Connection> {
        self.table.release_players()
    }
}

/// Ignores cancellation and runs far longer than any test.
pub(crate) struct Stubborn {
    table: Table,
}

impl Stubborn {
    pub(crate) fn new() -> Self {
        Self {
            table: Table::new(1),
        }
    }
}

#[async_trait]
impl Game for Stubborn {
    fn name(&self) -> &str {
        "Stubborn"
    }

    fn required_players(&self) -> usize {
        1
    }

    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict> {
        self.table.admit_player(connection)
    }

    async fn run(&mut self, _ctx: &SessionContext) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    fn release_players(&mut self) -> Vec<Connection> {
        self.table.release_players()
    }
}

/// Panics as soon as it runs.
pub(crate) struct Crashing {
    table: Table,
}

impl Crashing {
    pub(crate) fn new() -> Self {
        Self {
            table: Table::new(1),
        }
    }
}

#[async_trait]
impl Game for Crashing {
    fn name(&self) -> &str {
        "Crashing"
    }

    fn required_players(&self) -> usize {
        1
    }

    fn admit_player(&mut self, connection: Connection) -> Result<(), AdmissionConflict> {
        self.table.admit_player(connection)
    }

    async fn run(&mut self, _ctx: &SessionContext) {
        panic!("lost track of the score");
    }

    fn release_players(&mut self) -> Vec<Connection> {
        self.table.release_players()
    }
}
