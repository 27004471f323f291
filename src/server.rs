//! The relay server: listener, per-connection lifecycle, fan-out wiring
//!
//! Each accepted connection runs in its own task and walks one state path:
//! read HTTP → serve a resource and close, or upgrade to WebSocket and loop
//! decoding text frames until close, error, or server shutdown. Decoded
//! messages go to the application's [`MessageSink`] first, then to every
//! registered connection via [`ConnectionRegistry::broadcast`] — the sender
//! included.
//!
//! A connection failing in any way tears down that connection only; the
//! listener and the other connections are never affected.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{self, Decoded};
use crate::handshake;
use crate::registry::{ConnectionId, ConnectionRegistry};
use crate::resources::ResourceProvider;
use crate::router::{self, RequestKind};
use crate::{Config, MAX_FRAME_HEADER_SIZE};

/// Application callback receiving every decoded text message, invoked once
/// per message before it is broadcast.
///
/// Called from connection tasks; implementations should hand the text off
/// (store it, queue it) rather than block.
pub trait MessageSink: Send + Sync + 'static {
    fn on_message(&self, text: &str);
}

impl<F> MessageSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn on_message(&self, text: &str) {
        self(text)
    }
}

/// A single-port HTTP + WebSocket relay.
///
/// Cheap to clone via its inner `Arc`; `start`/`stop` may be called
/// repeatedly over the server's life (the reference application toggles the
/// relay from a menu).
pub struct RelayServer {
    shared: Arc<Shared>,
}

struct Shared {
    config: Config,
    resources: Arc<dyn ResourceProvider>,
    sink: Arc<dyn MessageSink>,
    registry: ConnectionRegistry,
    running: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl RelayServer {
    /// Create a relay over the given resource table and message sink.
    pub fn new(
        config: Config,
        resources: Arc<dyn ResourceProvider>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let registry = ConnectionRegistry::new(config.send_queue_capacity);
        Self {
            shared: Arc::new(Shared {
                config,
                resources,
                sink,
                registry,
                running: AtomicBool::new(false),
                local_addr: Mutex::new(None),
                shutdown: Mutex::new(None),
            }),
        }
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Returns [`Error::Bind`] if the port cannot be taken and
    /// [`Error::InvalidState`] if the server is already running. On success
    /// the server is reachable before this returns.
    pub async fn start(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("server already running"));
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.shared.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(Error::Bind(e));
            }
        };
        let local_addr = listener.local_addr().map_err(Error::Bind)?;
        *self.shared.local_addr.lock() = Some(local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shared.shutdown.lock() = Some(shutdown_tx);

        info!(addr = %local_addr, "relay listening");
        tokio::spawn(accept_loop(self.shared.clone(), listener, shutdown_rx));
        Ok(())
    }

    /// Stop accepting, close every connection, and drop the listener.
    /// Idempotent; the server can be started again afterwards.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(shutdown) = self.shared.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }
        self.shared.registry.clear();
        *self.shared.local_addr.lock() = None;
        info!("relay stopped");
    }

    /// Whether the listener is currently up (snapshot).
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of upgraded client connections (snapshot).
    pub fn client_count(&self) -> usize {
        self.shared.registry.count()
    }

    /// Address the listener is bound to, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }
}

impl Clone for RelayServer {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "connection accepted");
                    let shared = shared.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(shared, stream, peer, shutdown).await {
                            debug!(peer = %peer, error = %e, "connection closed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
    // Dropping the listener here stops new accepts; live connections shut
    // down through their own copies of the watch channel.
}

async fn handle_connection(
    shared: Arc<Shared>,
    mut stream: TcpStream,
    peer: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(4096);

    // Buffer reads until the blank-line terminator so a request split
    // across TCP segments still parses.
    let header_end = loop {
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
        if buf.len() > shared.config.max_header_size {
            return Err(Error::InvalidHttp("request too large"));
        }
        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            read = stream.read_buf(&mut buf) => {
                if read? == 0 {
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    };

    let raw = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| Error::InvalidHttp("request not UTF-8"))?;

    match router::classify(raw)? {
        RequestKind::Resource { path } => serve_resource(&shared, &mut stream, &path).await,
        RequestKind::Upgrade { key } => {
            // Bytes past the request belong to the frame stream: a client
            // may pipeline its first frame behind the handshake.
            buf.advance(header_end);
            run_websocket(shared, stream, peer, buf, &key, shutdown).await
        }
    }
}

/// Position one past the `\r\n\r\n` header terminator, if present.
fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

async fn serve_resource(shared: &Shared, stream: &mut TcpStream, path: &str) -> Result<()> {
    let response = match shared.resources.resolve(path) {
        Some(resource) => {
            debug!(path = %path, bytes = resource.body.len(), "serving resource");
            let mut buf = BytesMut::with_capacity(128 + resource.body.len());
            buf.put_slice(b"HTTP/1.1 200 OK\r\n");
            buf.put_slice(b"Content-Type: ");
            buf.put_slice(resource.content_type.as_bytes());
            buf.put_slice(b"\r\nContent-Length: ");
            buf.put_slice(resource.body.len().to_string().as_bytes());
            buf.put_slice(b"\r\nConnection: close\r\n\r\n");
            buf.put_slice(&resource.body);
            buf.freeze()
        }
        None => {
            debug!(path = %path, "resource not found");
            Bytes::from_static(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n")
        }
    };

    stream.write_all(&response).await?;
    stream.flush().await?;
    Ok(())
    // No keep-alive: the connection closes when the stream drops.
}

async fn run_websocket(
    shared: Arc<Shared>,
    stream: TcpStream,
    peer: SocketAddr,
    mut buf: BytesMut,
    key: &str,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    // Register only after the 101 goes out; a failed write closes the
    // connection without it ever joining the registry.
    let response = handshake::upgrade_response(&handshake::accept_key(key));
    writer.write_all(&response).await?;
    writer.flush().await?;

    let (id, outbound) = shared.registry.add();
    info!(peer = %peer, connection = %id, clients = shared.registry.count(), "client connected");

    tokio::spawn(write_outbound(
        shared.clone(),
        id,
        writer,
        outbound,
        shutdown.clone(),
    ));

    let result = read_frames(&shared, &mut reader, &mut buf, &mut shutdown).await;

    shared.registry.remove(id);
    info!(peer = %peer, connection = %id, clients = shared.registry.count(), "client disconnected");
    result
}

/// Receive loop: read, decode every complete frame, dispatch in arrival
/// order. Returns when the peer closes, a frame is invalid, or the server
/// shuts down.
async fn read_frames(
    shared: &Shared,
    reader: &mut OwnedReadHalf,
    buf: &mut BytesMut,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let max_buffered = shared.config.max_message_size + MAX_FRAME_HEADER_SIZE;

    loop {
        loop {
            match frame::decode(&buf[..], shared.config.max_message_size)? {
                Decoded::Text { message, consumed } => {
                    buf.advance(consumed);
                    shared.sink.on_message(&message);
                    shared.registry.broadcast(&message);
                }
                Decoded::Incomplete => break,
                Decoded::Close => return Ok(()),
            }
        }

        if buf.len() > max_buffered {
            return Err(Error::FrameTooLarge);
        }

        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            read = reader.read_buf(buf) => {
                if read? == 0 {
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }
}

/// Writer task: drain the connection's outbound queue onto the socket.
/// Ends when the queue's senders drop (deregistration), the write fails,
/// or the server shuts down.
async fn write_outbound(
    shared: Arc<Shared>,
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            queued = outbound.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        debug!(connection = %id, error = %e, "outbound write failed");
                        shared.registry.remove(id);
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nframe-bytes"), Some(18));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
        assert_eq!(find_header_end(b""), None);
    }
}
