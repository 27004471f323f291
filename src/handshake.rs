//! WebSocket upgrade handshake
//!
//! Accept-key derivation and the `101 Switching Protocols` response. The
//! request side lives in [`crate::router`]; this module only answers it.

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::WS_GUID;

/// Compute the `Sec-WebSocket-Accept` value for a client key:
/// `Base64(SHA-1(key + GUID))`.
#[inline]
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Build the upgrade response for a computed accept key.
pub fn upgrade_response(accept_key: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(160);

    buf.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.put_slice(b"Upgrade: websocket\r\n");
    buf.put_slice(b"Connection: Upgrade\r\n");
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept_key.as_bytes());
    buf.put_slice(b"\r\n\r\n");

    buf.freeze()
}
