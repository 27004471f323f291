//! # cliprelay: single-port LAN clipboard relay core
//!
//! A phone browser pushes clipboard text to a desktop over the local
//! network; the desktop relays every received message to all connected
//! clients. One TCP port serves both surfaces:
//!
//! - **Plain HTTP**: a small table of named byte resources (the web client's
//!   page and assets), supplied by the surrounding application.
//! - **WebSocket**: requests carrying `Upgrade: websocket` are switched in
//!   place; text frames are decoded, handed to a message sink, and fanned
//!   out to every live connection.
//!
//! The WebSocket layer is hand-rolled and self-contained: handshake key
//! derivation ([`handshake`]), RFC 6455 single-frame text encode/decode
//! ([`frame`]), and client-payload masking ([`mask`]). No TLS, extensions,
//! fragmentation, or binary frames.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cliprelay::{Config, RelayServer};
//! use cliprelay::resources::{Resource, ResourceMap};
//!
//! let mut resources = ResourceMap::new();
//! resources.insert("index", Resource::new("text/html", "<h1>hi</h1>"));
//!
//! let server = RelayServer::new(
//!     Config::default(),
//!     Arc::new(resources),
//!     Arc::new(|text: &str| println!("received: {text}")),
//! );
//! server.start().await?;
//! ```

pub mod error;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod registry;
pub mod resources;
pub mod router;
pub mod server;

pub use error::{Error, Result};
pub use frame::Decoded;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use resources::{Resource, ResourceMap, ResourceProvider};
pub use router::RequestKind;
pub use server::{MessageSink, RelayServer};

/// WebSocket GUID for handshake
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Largest payload encodable with a 2-byte header (length code 0-125)
pub const SMALL_MESSAGE_THRESHOLD: usize = 125;

/// Largest payload encodable with the 16-bit extended length field
pub const MEDIUM_MESSAGE_THRESHOLD: usize = 65535;

/// Maximum WebSocket frame header size (2 + 8 + 4 = 14 bytes)
pub const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3737;

/// Resource name an empty or `/` request path resolves to
pub const DEFAULT_RESOURCE: &str = "index";

/// Configuration for a relay server
///
/// # Example
///
/// ```
/// use cliprelay::Config;
///
/// let config = Config::builder()
///     .port(8080)
///     .max_message_size(1024 * 1024)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on (default: 3737; 0 picks an ephemeral port)
    pub port: u16,
    /// Maximum decoded message size in bytes (default: 16MB)
    ///
    /// Frames announcing a larger payload are rejected and the connection
    /// is dropped; this also bounds per-connection read buffering.
    pub max_message_size: usize,
    /// Maximum HTTP request header size (default: 8KB)
    pub max_header_size: usize,
    /// Outbound frames queued per connection before it is considered
    /// unreachable and dropped (default: 256)
    pub send_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_message_size: 16 * 1024 * 1024,
            max_header_size: 8192,
            send_queue_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for relay configuration
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the listening port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the maximum decoded message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the maximum HTTP request header size
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.config.max_header_size = size;
        self
    }

    /// Set the per-connection outbound queue depth
    pub fn send_queue_capacity(mut self, frames: usize) -> Self {
        self.config.send_queue_capacity = frames;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
