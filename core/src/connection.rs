use crate::codec::{self, Frame, PREFIX_SIZE};
use crate::Message;
use futures::FutureExt;
use std::{io, mem::MaybeUninit, net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

pub type ID = uuid::Uuid;

/// How long a receive waits for the rest of a frame once its first byte is in.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("send: {0}")]
    Send(#[source] io::Error),
    #[error("receive: {0}")]
    Receive(#[source] io::Error),
    #[error("timed out waiting for the rest of a frame")]
    ReceiveTimeout,
    #[error("codec: {0}")]
    Codec(#[from] codec::Error),
    #[error("connection has faulted")]
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    /// A send or receive failed at the transport level. The stream can no
    /// longer be trusted to be in sync and is treated as disconnected.
    Faulted,
}

/// One framed TCP stream to a peer.
#[derive(Debug)]
pub struct Connection {
    id: ID,
    peer: SocketAddr,
    stream: TcpStream,
    receive_timeout: Duration,
    state: State,
}

impl Connection {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            id: ID::new_v4(),
            peer,
            stream,
            receive_timeout: RECEIVE_TIMEOUT,
            state: State::Open,
        })
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }

    pub fn id(&self) -> ID {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.state == State::Faulted
    }

    pub(crate) fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Look at the next unread byte without consuming it. `Ok(0)` means the
    /// peer has closed its side.
    pub(crate) fn peek(&self) -> io::Result<usize> {
        let mut buf = [MaybeUninit::<u8>::uninit(); 1];
        socket2::SockRef::from(&self.stream).peek(&mut buf)
    }

    /// Non-blocking check for unread bytes.
    pub fn has_pending_data(&self) -> bool {
        self.state == State::Open && matches!(self.peek(), Ok(n) if n > 0)
    }

    /// Non-blocking check that a whole frame is buffered, so reading it
    /// cannot wait on the peer.
    pub fn has_complete_frame(&self) -> bool {
        if self.is_faulted() {
            return false;
        }
        let mut prefix = [0u8; PREFIX_SIZE];
        match self.stream.peek(&mut prefix).now_or_never() {
            Some(Ok(n)) if n == PREFIX_SIZE => {}
            _ => return false,
        }
        let mut frame = vec![0u8; PREFIX_SIZE + codec::body_len(prefix)];
        matches!(self.stream.peek(&mut frame).now_or_never(), Some(Ok(n)) if n == frame.len())
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        if self.is_faulted() {
            return Err(Error::Faulted);
        }
        let result = async {
            self.stream.write_all(frame.as_bytes()).await?;
            self.stream.flush().await
        }
        .await;
        if let Err(err) = result {
            self.state = State::Faulted;
            return Err(Error::Send(err));
        }
        Ok(())
    }

    pub async fn try_send(&mut self, message: &Message) -> Result<(), Error> {
        let frame = codec::encode(message)?;
        self.send_frame(&frame).await?;
        tracing::debug!(peer = %self.peer, ?message, "sent");
        Ok(())
    }

    /// Send a message, logging instead of failing. Returns whether the message
    /// was written.
    pub async fn send(&mut self, message: &Message) -> bool {
        match self.try_send(message).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(peer = %self.peer, "there was an issue sending a packet: {}", err);
                false
            }
        }
    }

    /// Read one message if any data is pending. Returns `Ok(None)` straight
    /// away when nothing has arrived.
    pub async fn try_receive(&mut self) -> Result<Option<Message>, Error> {
        if !self.has_pending_data() {
            return Ok(None);
        }

        let receive_timeout = self.receive_timeout;
        let stream = &mut self.stream;
        let body = tokio::time::timeout(receive_timeout, async move {
            let mut prefix = [0u8; PREFIX_SIZE];
            stream.read_exact(&mut prefix).await?;
            let mut body = vec![0u8; codec::body_len(prefix)];
            stream.read_exact(&mut body).await?;
            Ok::<_, io::Error>(body)
        })
        .await;

        let body = match body {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                self.state = State::Faulted;
                return Err(Error::Receive(err));
            }
            Err(_) => {
                self.state = State::Faulted;
                return Err(Error::ReceiveTimeout);
            }
        };

        let message = codec::decode_body(&body)?;
        tracing::debug!(peer = %self.peer, ?message, "received");
        Ok(Some(message))
    }

    /// Like [`Connection::try_receive`], but failures are logged and reported
    /// as no message.
    pub async fn receive_message(&mut self) -> Option<Message> {
        match self.try_receive().await {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(peer = %self.peer, "there was an issue reading a packet: {}", err);
                None
            }
        }
    }

    /// Shut the stream down and release the socket.
    pub async fn close(mut self) {
        if let Err(err) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, "shutdown: {}", err);
        }
    }
}
