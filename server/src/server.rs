//! The scheduler loop.
//!
//! One task owns the lobby, the idle pool, the set of known connections and
//! the connection → session index. Each pass it accepts pending connections,
//! forms sessions from the lobby, collects finished sessions, and sweeps
//! waiting connections for goodbyes and silent disconnects. Sessions run on
//! their own tasks and never touch any of this state.

use crate::{
    config::ServerConfig,
    game::{Game, GameFactory, SessionContext},
    lobby::Lobby,
    session::{self, SessionEnded, Sessions},
    Error,
};
use futures::FutureExt;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tcpgames::{connection, probe, Command, Connection, Message};
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
    task::JoinSet,
    time::{sleep, Instant},
};

pub const SHUTDOWN_NOTICE: &str = "The Game(s) Server is being shutdown.";

/// `bye` text when a client is disconnected without a particular reason.
pub const GOODBYE: &str = "Goodbye.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Listening,
    ShuttingDown,
}

/// How a waiting connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The client said `bye`.
    Graceful,
    /// The transport closed or failed without a `bye`.
    Ungraceful,
}

/// Control over a running [`Server`] from any task or thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    state: Arc<watch::Sender<State>>,
}

impl ServerHandle {
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Ask the server to shut down. Does nothing unless it is listening.
    pub fn shutdown(&self) {
        let requested = self.state.send_if_modified(|state| {
            if *state == State::Listening {
                *state = State::ShuttingDown;
                true
            } else {
                false
            }
        });
        if requested {
            tracing::info!("Shutting down the Game(s) Server...");
        }
    }

    /// Wait until the server reaches `state`.
    pub async fn wait_for(&self, state: State) {
        let mut receiver = self.state.subscribe();
        // The sender lives in this handle, so the channel cannot close here.
        let _ = receiver.wait_for(|current| *current == state).await;
    }
}

/// The game that the next players from the lobby will join.
struct PendingGame {
    game: Box<dyn Game>,
    admitted: Vec<connection::ID>,
}

impl PendingGame {
    fn new(factory: &GameFactory) -> Self {
        Self {
            game: factory(),
            admitted: Vec::new(),
        }
    }

    fn still_needed(&self) -> usize {
        self.game
            .required_players()
            .max(1)
            .saturating_sub(self.admitted.len())
    }
}

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    factory: GameFactory,
    state: Arc<watch::Sender<State>>,
    lobby: Lobby,
    /// Known connections that are neither waiting nor playing, such as the
    /// players of a finished game.
    idle: Vec<Connection>,
    known: HashMap<connection::ID, SocketAddr>,
    sessions: Sessions,
    pending: PendingGame,
    /// Goodbyes still waiting out their delay before the close.
    farewells: JoinSet<()>,
    events_tx: mpsc::UnboundedSender<SessionEnded>,
    events_rx: mpsc::UnboundedReceiver<SessionEnded>,
}

impl Server {
    /// Bind the listening socket. Fails fast if the address is unavailable.
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig, factory: GameFactory) -> Result<Self, Error> {
        let address = config.address();
        let listener = std::net::TcpListener::bind((config.host, config.port)).map_err(
            |source| Error::Bind {
                address: address.clone(),
                source,
            },
        )?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        let local_addr = listener.local_addr()?;
        let (state, _) = watch::channel(State::Stopped);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = PendingGame::new(&factory);
        Ok(Self {
            config,
            listener,
            local_addr,
            factory,
            state: Arc::new(state),
            lobby: Lobby::new(),
            idle: Vec::new(),
            known: HashMap::new(),
            sessions: Sessions::default(),
            pending,
            farewells: JoinSet::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: self.state.clone(),
        }
    }

    /// Serve until [`ServerHandle::shutdown`] is called, then disconnect every
    /// client and release the listener.
    pub async fn run(mut self) {
        tracing::info!(
            "Starting the \"{}\" Game(s) Server on {}",
            self.config.name,
            self.local_addr
        );
        let mut state = self.state.subscribe();
        self.state.send_replace(State::Listening);
        tracing::info!("Waiting for incoming connections...");

        while *state.borrow_and_update() == State::Listening {
            self.tick().await;
            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = state.changed() => {}
            }
        }

        self.shutdown().await;
    }

    /// One scheduler pass.
    async fn tick(&mut self) {
        self.accept_pending().await;
        self.form_sessions();
        for ended in self.collect_ended_sessions() {
            self.settle(ended).await;
        }
        self.sweep_lobby().await;
        self.sweep_idle().await;
        self.reap_farewells();
    }

    async fn accept_pending(&mut self) {
        loop {
            let stream = match self.listener.accept().now_or_never() {
                None => return,
                Some(Ok((stream, _))) => stream,
                Some(Err(err)) => {
                    tracing::warn!("failed to accept a connection: {}", err);
                    return;
                }
            };
            let mut connection = match Connection::new(stream) {
                Ok(connection) => connection.with_receive_timeout(self.config.receive_timeout),
                Err(err) => {
                    tracing::warn!("failed to set up an accepted connection: {}", err);
                    continue;
                }
            };
            tracing::info!("New connection from {}", connection.peer());

            self.known.insert(connection.id(), connection.peer());
            let welcome = format!("Welcome to the \"{}\" Games Server.\n", self.config.name);
            connection.send(&Message::message(welcome)).await;
            self.lobby.push_back(connection);
        }
    }

    /// Move players from the lobby into games for as long as there are enough
    /// of them waiting.
    fn form_sessions(&mut self) {
        loop {
            let needed = self.pending.still_needed();
            if self.lobby.len() < needed {
                return;
            }
            let admitted = self.lobby.offer(self.pending.game.as_mut(), needed);
            self.pending.admitted.extend(admitted);
            if self.pending.still_needed() > 0 {
                return;
            }

            let ready = std::mem::replace(&mut self.pending, PendingGame::new(&self.factory));
            let ctx = SessionContext::new(
                session::ID::new_v4(),
                self.config.poll_interval,
                self.config.probe_timeout,
            );
            let handle = session::spawn(ready.game, ready.admitted, ctx, self.events_tx.clone());
            self.sessions.insert(handle);
        }
    }

    /// Drain reports from finished sessions. Players of a session whose task
    /// ended without reporting (the game panicked) are disconnected.
    fn collect_ended_sessions(&mut self) -> Vec<SessionEnded> {
        let finished = self.sessions.finished();
        let mut ended = Vec::new();
        while let Ok(report) = self.events_rx.try_recv() {
            self.sessions.remove(report.id);
            ended.push(report);
        }
        for id in finished {
            if let Some(handle) = self.sessions.remove(id) {
                tracing::warn!(session = %id, "\"{}\" game ended without reporting back", handle.name());
                for connection in handle.recover_players() {
                    self.disconnect_client(connection, None);
                }
                for player in handle.players() {
                    self.known.remove(player);
                }
            }
        }
        ended
    }

    /// Players that left are dropped, the rest wait in the idle pool.
    async fn settle(&mut self, ended: SessionEnded) {
        for connection in ended.players {
            if ended.departed.contains(&connection.id()) {
                tracing::info!("Client {} has left the game.", connection.peer());
                self.forget(connection).await;
            } else {
                self.idle.push(connection);
            }
        }
    }

    async fn sweep_lobby(&mut self) -> Vec<(connection::ID, Departure)> {
        let departures = departures(self.lobby.iter_mut(), &self.config).await;
        for &(id, departure) in &departures {
            if let Some(connection) = self.lobby.remove(id) {
                self.disconnected(connection, departure).await;
            }
        }
        departures
    }

    async fn sweep_idle(&mut self) -> Vec<(connection::ID, Departure)> {
        let departures = departures(self.idle.iter_mut(), &self.config).await;
        for &(id, departure) in &departures {
            if let Some(position) = self.idle.iter().position(|c| c.id() == id) {
                let connection = self.idle.swap_remove(position);
                self.disconnected(connection, departure).await;
            }
        }
        departures
    }

    async fn disconnected(&mut self, connection: Connection, departure: Departure) {
        match departure {
            Departure::Graceful => tracing::info!(
                "Client {} has disconnected from the Game(s) Server.",
                connection.peer()
            ),
            Departure::Ungraceful => tracing::warn!(
                "Client {} has disconnected from the Game(s) Server ungracefully.",
                connection.peer()
            ),
        }
        self.forget(connection).await;
    }

    /// Send `bye` with `reason`, or [`GOODBYE`], to a client the scheduler
    /// holds, tell its session if it has one, and forget it. The connection
    /// closes once the client has had `goodbye_delay` to read the notice; that
    /// wait runs in the background.
    fn disconnect_client(&mut self, mut connection: Connection, reason: Option<&str>) {
        tracing::info!("Disconnecting the client from {}", connection.peer());
        self.sessions.notify_player_left(connection.id());
        self.known.remove(&connection.id());
        let reason = reason.unwrap_or(GOODBYE).to_owned();
        let goodbye_delay = self.config.goodbye_delay;
        self.farewells.spawn(async move {
            connection.send(&Message::bye(reason)).await;
            sleep(goodbye_delay).await;
            connection.close().await;
        });
    }

    /// Join the farewells that have finished, without waiting on the rest.
    fn reap_farewells(&mut self) {
        while let Some(Some(result)) = self.farewells.join_next().now_or_never() {
            if let Err(err) = result {
                tracing::warn!("failed to disconnect a client: {}", err);
            }
        }
    }

    /// Drop every trace of a connection and close it.
    async fn forget(&mut self, connection: Connection) {
        self.sessions.notify_player_left(connection.id());
        self.known.remove(&connection.id());
        self.lobby.remove(connection.id());
        connection.close().await;
    }

    async fn shutdown(mut self) {
        // Stop every session and take back its players.
        self.sessions.cancel_all();
        let mut returned = Vec::new();
        let deadline = Instant::now() + self.config.shutdown_grace;
        loop {
            for ended in self.collect_ended_sessions() {
                returned.extend(ended.players);
            }
            if self.sessions.is_empty() || Instant::now() >= deadline {
                break;
            }
            sleep(self.config.poll_interval).await;
        }
        // Sessions still running past the grace period are aborted at their
        // next await point, which hands their players back.
        let overdue = self.sessions.drain();
        for handle in &overdue {
            tracing::warn!(
                session = %handle.id(),
                "\"{}\" game did not stop in time, aborting it",
                handle.name()
            );
        }
        let grace = self.config.shutdown_grace;
        let recovered =
            futures::future::join_all(overdue.into_iter().map(|handle| handle.abort(grace))).await;
        returned.extend(recovered.into_iter().flatten());

        // Say goodbye to everyone still here, all at once.
        let mut remaining: Vec<Connection> = self.lobby.drain().collect();
        remaining.append(&mut self.idle);
        remaining.extend(self.pending.game.release_players());
        remaining.extend(returned);
        for connection in remaining {
            self.disconnect_client(connection, Some(SHUTDOWN_NOTICE));
        }
        while let Some(result) = self.farewells.join_next().await {
            if let Err(err) = result {
                tracing::warn!("failed to disconnect a client: {}", err);
            }
        }
        self.known.clear();

        let Self {
            listener, state, ..
        } = self;
        drop(listener);
        state.send_replace(State::Stopped);
        tracing::info!("The server has been shut down.");
    }
}

/// Check every connection for a `bye` or a silent disconnect, all at once.
async fn departures<'a>(
    connections: impl Iterator<Item = &'a mut Connection>,
    config: &ServerConfig,
) -> Vec<(connection::ID, Departure)> {
    let checks = connections.map(move |connection| async move {
        let found = departure(&mut *connection, config).await;
        found.map(|departure| (connection.id(), departure))
    });
    futures::future::join_all(checks)
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn departure(connection: &mut Connection, config: &ServerConfig) -> Option<Departure> {
    // A frame still arriving is left for a later pass.
    if connection.has_complete_frame() {
        match connection.receive_message().await {
            Some(message) if message.is(Command::Bye) => return Some(Departure::Graceful),
            Some(message) => {
                tracing::debug!(peer = %connection.peer(), ?message, "ignoring message from waiting client")
            }
            None => {}
        }
    }
    if probe::is_disconnected(connection, config.probe_timeout).await {
        return Some(Departure::Ungraceful);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Crashing, Picky, Stubborn, Table};
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tcpgames::codec;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    };

    fn config() -> ServerConfig {
        ServerConfig {
            host: Ipv4Addr::LOCALHOST.into(),
            port: 0,
            poll_interval: Duration::from_millis(5),
            probe_timeout: Duration::from_millis(5),
            receive_timeout: Duration::from_millis(500),
            shutdown_grace: Duration::from_millis(300),
            goodbye_delay: Duration::from_millis(10),
            ..ServerConfig::new("Test Hall", 0)
        }
    }

    fn tables(capacity: usize) -> GameFactory {
        Box::new(move || Box::new(Table::new(capacity)) as Box<dyn Game>)
    }

    async fn read_message(stream: &mut TcpStream) -> Message {
        let mut prefix = [0u8; codec::PREFIX_SIZE];
        stream.read_exact(&mut prefix).await.unwrap();
        let mut body = vec![0u8; codec::body_len(prefix)];
        stream.read_exact(&mut body).await.unwrap();
        codec::decode_body(&body).unwrap()
    }

    /// Connect `count` clients and accept them into the lobby, in order.
    async fn join(server: &mut Server, count: usize) -> Vec<TcpStream> {
        let mut clients = Vec::new();
        for _ in 0..count {
            let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
            let before = server.lobby.len();
            while server.lobby.len() == before {
                server.accept_pending().await;
                sleep(Duration::from_millis(2)).await;
            }
            let welcome = read_message(&mut client).await;
            assert_eq!(welcome, Message::message("Welcome to the \"Test Hall\" Games Server.\n"));
            clients.push(client);
        }
        clients
    }

    async fn assert_closed(client: &mut TcpStream) {
        let mut byte = [0u8; 1];
        let read = timeout(Duration::from_secs(2), client.read(&mut byte))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)), "expected EOF, got {:?}", read);
    }

    async fn sweep_until_departed(server: &mut Server) -> Vec<(connection::ID, Departure)> {
        for _ in 0..100 {
            let departures = server.sweep_lobby().await;
            if !departures.is_empty() {
                return departures;
            }
            sleep(Duration::from_millis(5)).await;
        }
        Vec::new()
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let server = Server::bind(config(), tables(1)).unwrap();
        let taken = ServerConfig {
            port: server.local_addr().port(),
            ..config()
        };
        assert!(matches!(
            Server::bind(taken, tables(1)),
            Err(Error::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn lobby_is_first_in_first_out() {
        let mut server = Server::bind(config(), tables(2)).unwrap();
        let _clients = join(&mut server, 3).await;
        let ids = server.lobby.ids();

        server.form_sessions();

        assert_eq!(server.sessions.len(), 1);
        let session = server.sessions.session_of(ids[0]).unwrap();
        assert_eq!(server.sessions.get(session).unwrap().players(), &ids[..2]);
        assert_eq!(server.sessions.session_of(ids[1]), Some(session));
        assert_eq!(server.sessions.session_of(ids[2]), None);
        assert_eq!(server.lobby.ids(), vec![ids[2]]);
        assert_eq!(server.known.len(), 3);
    }

    #[tokio::test]
    async fn rejected_player_stays_in_the_lobby() {
        let mut server = Server::bind(config(), tables(2)).unwrap();
        let _clients = join(&mut server, 3).await;
        let ids = server.lobby.ids();
        server.pending.game = Box::new(Picky::rejecting(ids[0], 2));

        server.form_sessions();

        let session = server.sessions.session_of(ids[1]).unwrap();
        assert_eq!(server.sessions.get(session).unwrap().players(), &ids[1..]);
        assert_eq!(server.lobby.ids(), vec![ids[0]]);
        assert_eq!(server.sessions.session_of(ids[0]), None);
    }

    #[tokio::test]
    async fn partially_filled_game_waits_for_more_players() {
        let mut server = Server::bind(config(), tables(2)).unwrap();
        let _first = join(&mut server, 2).await;
        let ids = server.lobby.ids();
        server.pending.game = Box::new(Picky::rejecting(ids[0], 2));

        server.form_sessions();
        assert!(server.sessions.is_empty());
        assert_eq!(server.pending.admitted, vec![ids[1]]);
        assert_eq!(server.lobby.ids(), vec![ids[0]]);

        let _second = join(&mut server, 1).await;
        let late = server.lobby.ids()[1];
        server.form_sessions();
        let session = server.sessions.session_of(ids[1]).unwrap();
        assert_eq!(server.sessions.get(session).unwrap().players(), &[ids[1], late]);
        assert_eq!(server.lobby.ids(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn silent_close_removes_only_that_connection() {
        let mut server = Server::bind(config(), tables(5)).unwrap();
        let mut clients = join(&mut server, 3).await;
        let ids = server.lobby.ids();

        drop(clients.remove(1));
        let departures = sweep_until_departed(&mut server).await;

        assert_eq!(departures, vec![(ids[1], Departure::Ungraceful)]);
        assert_eq!(server.lobby.ids(), vec![ids[0], ids[2]]);
        assert!(!server.known.contains_key(&ids[1]));
        assert_eq!(server.known.len(), 2);
    }

    #[tokio::test]
    async fn goodbye_is_a_graceful_departure() {
        let mut server = Server::bind(config(), tables(5)).unwrap();
        let mut clients = join(&mut server, 2).await;
        let ids = server.lobby.ids();

        let bye = codec::encode(&Message::bye("")).unwrap();
        clients[0].write_all(bye.as_bytes()).await.unwrap();
        let departures = sweep_until_departed(&mut server).await;

        assert_eq!(departures, vec![(ids[0], Departure::Graceful)]);
        assert_eq!(server.lobby.ids(), vec![ids[1]]);
        assert_eq!(server.known.len(), 1);
    }

    #[tokio::test]
    async fn finished_session_returns_players_to_the_idle_pool() {
        let mut server = Server::bind(config(), tables(2)).unwrap();
        let mut clients = join(&mut server, 2).await;
        let ids = server.lobby.ids();
        server.form_sessions();

        // One player drops; the table ends and hands both players back.
        drop(clients.remove(0));
        let mut ended = Vec::new();
        for _ in 0..200 {
            ended = server.collect_ended_sessions();
            if !ended.is_empty() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].departed, vec![ids[0]]);
        server.settle(ended.pop().unwrap()).await;

        assert!(server.sessions.is_empty());
        assert_eq!(server.sessions.session_of(ids[1]), None);
        assert_eq!(server.idle.iter().map(Connection::id).collect::<Vec<_>>(), vec![ids[1]]);
        assert!(server.lobby.is_empty());
        assert_eq!(server.known.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_says_goodbye_to_everyone() {
        let mut server = Server::bind(config(), tables(2)).unwrap();
        let mut clients = join(&mut server, 3).await;
        server.form_sessions();
        assert_eq!(server.sessions.len(), 1);
        assert_eq!(server.lobby.len(), 1);

        let handle = server.handle();
        let run = tokio::spawn(server.run());
        handle.wait_for(State::Listening).await;

        handle.shutdown();
        handle.shutdown();
        timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
        assert_eq!(handle.state(), State::Stopped);

        // Two players from the session and one from the lobby.
        for client in &mut clients {
            let message = timeout(Duration::from_secs(2), read_message(client))
                .await
                .unwrap();
            assert_eq!(message, Message::bye(SHUTDOWN_NOTICE));
            assert_closed(client).await;
        }
    }

    #[tokio::test]
    async fn stubborn_session_is_aborted_after_the_grace_period() {
        let factory: GameFactory = Box::new(|| Box::new(Stubborn::new()) as Box<dyn Game>);
        let mut server = Server::bind(config(), factory).unwrap();
        let mut clients = join(&mut server, 2).await;
        server.form_sessions();
        assert_eq!(server.sessions.len(), 2);

        let handle = server.handle();
        let run = tokio::spawn(server.run());
        handle.wait_for(State::Listening).await;
        handle.shutdown();
        timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
        assert_eq!(handle.state(), State::Stopped);

        // The aborted games handed their players back for a proper goodbye.
        for client in &mut clients {
            let message = timeout(Duration::from_secs(2), read_message(client))
                .await
                .unwrap();
            assert_eq!(message, Message::bye(SHUTDOWN_NOTICE));
            assert_closed(client).await;
        }
    }

    #[tokio::test]
    async fn half_sent_frame_does_not_stall_the_sweep() {
        let patient = ServerConfig {
            receive_timeout: Duration::from_secs(5),
            ..config()
        };
        let mut server = Server::bind(patient, tables(5)).unwrap();
        let mut clients = join(&mut server, 2).await;
        let ids = server.lobby.ids();

        let bye = codec::encode(&Message::bye("")).unwrap();
        let (head, tail) = bye.as_bytes().split_at(3);
        clients[0].write_all(head).await.unwrap();
        sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        for _ in 0..5 {
            assert!(server.sweep_lobby().await.is_empty());
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        let _late = join(&mut server, 1).await;
        assert_eq!(server.lobby.len(), 3);

        clients[0].write_all(tail).await.unwrap();
        let departures = sweep_until_departed(&mut server).await;
        assert_eq!(departures, vec![(ids[0], Departure::Graceful)]);
        assert_eq!(server.lobby.len(), 2);
    }

    #[tokio::test]
    async fn disconnect_client_says_goodbye_then_closes() {
        let slow = ServerConfig {
            goodbye_delay: Duration::from_millis(100),
            ..config()
        };
        let mut server = Server::bind(slow, tables(5)).unwrap();
        let mut clients = join(&mut server, 2).await;
        let connection = server.lobby.pop_front().unwrap();
        let id = connection.id();

        let started = Instant::now();
        server.disconnect_client(connection, None);
        assert!(!server.known.contains_key(&id));
        assert_eq!(server.known.len(), 1);

        let message = timeout(Duration::from_secs(2), read_message(&mut clients[0]))
            .await
            .unwrap();
        assert_eq!(message, Message::bye(GOODBYE));
        assert_closed(&mut clients[0]).await;
        assert!(started.elapsed() >= Duration::from_millis(100));

        let finished = timeout(Duration::from_secs(2), server.farewells.join_next())
            .await
            .unwrap();
        assert!(matches!(finished, Some(Ok(()))));
        server.reap_farewells();
        assert!(server.farewells.is_empty());
    }

    #[tokio::test]
    async fn players_of_a_crashed_game_are_disconnected() {
        let factory: GameFactory = Box::new(|| Box::new(Crashing::new()) as Box<dyn Game>);
        let mut server = Server::bind(config(), factory).unwrap();
        let mut clients = join(&mut server, 1).await;
        server.form_sessions();
        assert_eq!(server.sessions.len(), 1);

        for _ in 0..200 {
            assert!(server.collect_ended_sessions().is_empty());
            if server.sessions.is_empty() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(server.sessions.is_empty());
        assert!(server.known.is_empty());

        let message = timeout(Duration::from_secs(2), read_message(&mut clients[0]))
            .await
            .unwrap();
        assert_eq!(message, Message::bye(GOODBYE));
        assert_closed(&mut clients[0]).await;
    }

    #[tokio::test]
    async fn shutdown_before_run_is_ignored() {
        let server = Server::bind(config(), tables(1)).unwrap();
        let handle = server.handle();
        handle.shutdown();
        assert_eq!(handle.state(), State::Stopped);
    }
}
