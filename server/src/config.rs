use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Shown to clients in the welcome message.
    pub name: String,
    pub host: IpAddr,
    /// `0` lets the OS pick a free port.
    pub port: u16,
    /// Nap between scheduler passes, and between polls inside a session.
    pub poll_interval: Duration,
    /// Bounded wait of the liveness probe.
    pub probe_timeout: Duration,
    /// How long a receive waits for a frame to arrive in full.
    pub receive_timeout: Duration,
    /// How long shutdown waits for running sessions to notice cancellation.
    pub shutdown_grace: Duration,
    /// Pause between sending `bye` and closing, so the client can read it.
    pub goodbye_delay: Duration,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Bad BBS".into(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: tcpgames::PORT,
            poll_interval: Duration::from_millis(10),
            probe_timeout: tcpgames::probe::PROBE_TIMEOUT,
            receive_timeout: tcpgames::connection::RECEIVE_TIMEOUT,
            shutdown_grace: Duration::from_secs(1),
            goodbye_delay: Duration::from_millis(100),
        }
    }
}
