use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{trace, warn};

use crate::handler::Handler;
use crate::http::connection::{Connection, ConnectionId, ReadFraming};

/// Longest line accepted while waiting for a line ending.
const MAX_LINE: usize = 64 * 1024;

#[derive(Debug)]
struct Shared {
    outbound: Vec<Bytes>,
    framing: ReadFraming,
    closing: bool,
}

/// A TCP connection as seen by the dispatch core.
///
/// Writes are queued and flushed by [`serve`] after each batch of read
/// events; a disconnect request takes effect once the queue is flushed.
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    shared: Mutex<Shared>,
}

impl TcpConnection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            shared: Mutex::new(Shared {
                outbound: Vec::new(),
                framing: ReadFraming::Line,
                closing: false,
            }),
        }
    }

    pub fn framing(&self) -> ReadFraming {
        self.lock().framing
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    fn take_outbound(&self) -> Vec<Bytes> {
        std::mem::take(&mut self.lock().outbound)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn write(&self, bytes: Bytes) {
        self.lock().outbound.push(bytes);
    }

    fn disconnect(&self) {
        self.lock().closing = true;
    }

    fn set_read_framing(&self, framing: ReadFraming) {
        self.lock().framing = framing;
    }
}

#[derive(Debug, Clone, Copy)]
enum ConnectionState {
    Reading,
    Dispatching,
    Writing,
    Closed,
}

/// Runs one connection until the peer hangs up or the core disconnects it.
pub async fn serve(
    mut stream: TcpStream,
    conn: TcpConnection,
    handler: Arc<Handler>,
) -> anyhow::Result<()> {
    handler.on_connected(&conn);

    let mut buffer = BytesMut::with_capacity(4096);
    let mut state = ConnectionState::Reading;

    let result = loop {
        match state {
            ConnectionState::Reading => match stream.read_buf(&mut buffer).await {
                // Client closed connection
                Ok(0) => break Ok(()),
                Ok(n) => {
                    trace!(conn = %conn.id(), bytes = n, "Read");
                    state = ConnectionState::Dispatching;
                }
                Err(e) => break Err(e.into()),
            },

            ConnectionState::Dispatching => {
                while let Some(event) = conn.framing().split(&mut buffer) {
                    handler.on_data(&event, &conn);
                    if conn.is_closing() {
                        break;
                    }
                }

                if conn.framing() == ReadFraming::Line && buffer.len() > MAX_LINE {
                    warn!(conn = %conn.id(), buffered = buffer.len(), "Line too long, closing");
                    conn.disconnect();
                }

                state = ConnectionState::Writing;
            }

            ConnectionState::Writing => {
                if let Err(e) = flush(&mut stream, conn.take_outbound()).await {
                    handler.on_write_failed(&conn, &e);
                    break Err(e.into());
                }

                state = if conn.is_closing() {
                    ConnectionState::Closed
                } else {
                    ConnectionState::Reading
                };
            }

            ConnectionState::Closed => {
                let _ = stream.shutdown().await;
                break Ok(());
            }
        }
    };

    handler.on_disconnected(&conn);
    result
}

async fn flush(stream: &mut TcpStream, chunks: Vec<Bytes>) -> std::io::Result<()> {
    for chunk in chunks {
        stream.write_all(&chunk).await?;
    }
    stream.flush().await
}
