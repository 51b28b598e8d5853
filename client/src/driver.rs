use crate::{operator::Operator, Error};
use std::{sync::Arc, time::Duration};
use tcpgames::{connection, probe, Command, Connection, Message};
use tokio::{net::TcpStream, sync::watch, time::sleep};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub receive_timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: tcpgames::PORT,
            poll_interval: Duration::from_millis(10),
            probe_timeout: probe::PROBE_TIMEOUT,
            receive_timeout: connection::RECEIVE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connected,
    /// The operator asked to leave; `bye` goes out on the next pass.
    Disconnecting,
}

/// How [`Client::run`] came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ended {
    /// The server said `bye`, with this message.
    ServerBye(String),
    /// We said `bye` after [`ClientHandle::disconnect`].
    Local,
    /// The connection dropped without a `bye` from either side.
    Ungraceful,
}

/// Requests a disconnect from any task or thread.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    state: Arc<watch::Sender<State>>,
}

impl ClientHandle {
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Ask the client to say `bye` and disconnect. Does nothing unless
    /// connected.
    pub fn disconnect(&self) {
        let requested = self.state.send_if_modified(|state| {
            if *state == State::Connected {
                *state = State::Disconnecting;
                true
            } else {
                false
            }
        });
        if requested {
            tracing::info!("Disconnecting from the server...");
        }
    }
}

pub struct Client {
    config: ClientConfig,
    operator: Arc<dyn Operator>,
    connection: Option<Connection>,
    state: Arc<watch::Sender<State>>,
}

impl Client {
    pub fn new(config: ClientConfig, operator: Arc<dyn Operator>) -> Self {
        let (state, _) = watch::channel(State::Disconnected);
        Self {
            config,
            operator,
            connection: None,
            state: Arc::new(state),
        }
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    #[tracing::instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.connection.is_some() {
            return Err(Error::AlreadyConnected);
        }
        let connect_error = |source| Error::Connect {
            address: self.config.address(),
            source,
        };
        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(connect_error)?;
        let connection = Connection::new(stream)
            .map_err(connect_error)?
            .with_receive_timeout(self.config.receive_timeout);

        tracing::info!("Connected to server at {}", connection.peer());
        self.connection = Some(connection);
        self.state.send_replace(State::Connected);
        Ok(())
    }

    /// Receive and dispatch messages until the connection ends.
    pub async fn run(&mut self) -> Result<Ended, Error> {
        let mut connection = self.connection.take().ok_or(Error::NotConnected)?;
        let mut state = self.state.subscribe();

        let ended = loop {
            if *state.borrow_and_update() == State::Disconnecting {
                connection.send(&Message::bye("")).await;
                break Ended::Local;
            }

            if let Some(message) = connection.receive_message().await {
                if let Some(ended) = self.dispatch(&mut connection, message, &mut state).await {
                    break ended;
                }
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = state.changed() => {}
            }
            if *state.borrow() == State::Disconnecting {
                continue;
            }

            if probe::is_disconnected(&connection, self.config.probe_timeout).await {
                tracing::warn!("The server has disconnected from us ungracefully.");
                self.operator
                    .write("The server has disconnected from us ungracefully.\n:[\n");
                break Ended::Ungraceful;
            }
        };

        connection.close().await;
        self.state.send_replace(State::Disconnected);
        self.operator.write("Disconnected.\n");
        Ok(ended)
    }

    async fn dispatch(
        &self,
        connection: &mut Connection,
        message: Message,
        state: &mut watch::Receiver<State>,
    ) -> Option<Ended> {
        match message.kind() {
            Some(Command::Bye) => {
                self.operator
                    .write("The server is disconnecting us with this message:\n");
                self.operator.write(message.payload());
                self.operator.write("\n");
                Some(Ended::ServerBye(message.into_payload()))
            }
            Some(Command::Message) => {
                self.operator.write(message.payload());
                None
            }
            Some(Command::Input) => {
                self.operator.write(message.payload());
                let operator = self.operator.clone();
                let line = tokio::task::spawn_blocking(move || operator.read_line());
                tokio::select! {
                    line = line => match line {
                        Ok(Ok(line)) => {
                            connection.send(&Message::input(line)).await;
                        }
                        Ok(Err(err)) => {
                            tracing::warn!("failed to read operator input: {}", err);
                            self.handle().disconnect();
                        }
                        Err(err) => tracing::warn!("operator input task failed: {}", err),
                    },
                    // The pending read is left to finish on its own.
                    _ = disconnect_requested(state) => {}
                }
                None
            }
            None => {
                tracing::debug!(command = message.command(), "no handler for command");
                None
            }
        }
    }
}

async fn disconnect_requested(state: &mut watch::Receiver<State>) {
    while *state.borrow_and_update() != State::Disconnecting {
        if state.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
