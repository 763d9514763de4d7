//! TCP transport over `tokio::net::TcpStream`
//!
//! One task per connection. The task owns the socket and reports every
//! state change as an [`Event`]; `send` and `disconnect` reach it through a
//! command channel.

use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use tcpget_core::{ConnectionId, Error, Event, EventSender, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Default bound on establishing a connection
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Size of one read from the socket
const READ_CHUNK: usize = 1460;

enum Command {
    Send(Vec<u8>),
    Disconnect,
}

/// Tokio TCP transport
pub struct TokioTransport {
    events: EventSender,
    connect_timeout: Duration,
    next_id: u64,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Command>>,
}

impl TokioTransport {
    /// Create a transport posting to `events`
    pub fn new(events: EventSender) -> Self {
        Self::with_connect_timeout(events, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    /// Create with a custom connect timeout
    pub fn with_connect_timeout(events: EventSender, connect_timeout: Duration) -> Self {
        Self {
            events,
            connect_timeout,
            next_id: 0,
            connections: HashMap::new(),
        }
    }

    /// Connections whose task is still running
    pub fn open_connections(&self) -> usize {
        self.connections.values().filter(|tx| !tx.is_closed()).count()
    }
}

impl Transport for TokioTransport {
    fn connect(&mut self, remote: SocketAddrV4) -> ConnectionId {
        self.connections.retain(|_, tx| !tx.is_closed());

        self.next_id += 1;
        let connection = ConnectionId(self.next_id);

        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(connection, tx);

        tokio::spawn(drive_connection(
            connection,
            remote,
            self.connect_timeout,
            rx,
            self.events.clone(),
        ));

        connection
    }

    fn send(&mut self, connection: ConnectionId, data: &[u8]) -> Result<(), Error> {
        let Some(tx) = self.connections.get(&connection) else {
            return Err(Error::transport(format!("Unknown connection {}", connection)));
        };

        if tx.send(Command::Send(data.to_vec())).is_err() {
            return Err(Error::transport(format!("{} is closed", connection)));
        }
        Ok(())
    }

    fn disconnect(&mut self, connection: ConnectionId) -> Result<(), Error> {
        match self.connections.remove(&connection) {
            Some(tx) => {
                // a finished task has already posted Disconnected
                let _ = tx.send(Command::Disconnect);
                Ok(())
            }
            None => Err(Error::transport(format!("Unknown connection {}", connection))),
        }
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        for (_, tx) in self.connections.drain() {
            let _ = tx.send(Command::Disconnect);
        }
    }
}

async fn drive_connection(
    connection: ConnectionId,
    remote: SocketAddrV4,
    connect_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: EventSender,
) {
    let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(SocketAddr::V4(remote))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let _ = events.send(Event::ConnectFailed {
                connection,
                error: e.to_string(),
            });
            return;
        }
        Err(_) => {
            let _ = events.send(Event::ConnectFailed {
                connection,
                error: format!("connect to {} timed out after {:?}", remote, connect_timeout),
            });
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("{}: could not set TCP_NODELAY: {}", connection, e);
    }

    if events.send(Event::Connected(connection)).is_err() {
        return;
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(data)) => {
                    let event = match writer.write_all(&data).await {
                        Ok(()) => Event::Sent(connection),
                        Err(e) => Event::SendFailed {
                            connection,
                            error: e.to_string(),
                        },
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                // transport dropped or disconnect requested
                Some(Command::Disconnect) | None => break,
            },

            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("{}: closed by peer", connection);
                    break;
                }
                Ok(n) => {
                    let event = Event::Received {
                        connection,
                        data: buf[..n].to_vec(),
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("{}: read failed: {}", connection, e);
                    break;
                }
            },
        }
    }

    let _ = writer.shutdown().await;
    let _ = events.send(Event::Disconnected(connection));
}
