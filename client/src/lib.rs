//! Client side of the games protocol: one connection, messages dispatched to
//! the operator as they arrive.

mod driver;
pub mod operator;

pub use driver::{Client, ClientConfig, ClientHandle, Ended, State};
pub use operator::{Operator, Terminal};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wasn't able to connect to server at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
}
