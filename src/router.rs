//! HTTP request classification
//!
//! One listening port serves both surfaces, so the first bytes of every
//! connection are parsed just far enough to tell a WebSocket upgrade from a
//! plain resource fetch. The parse is deliberately minimal: request line
//! plus a flat header map, no body handling, no method dispatch (any method
//! is served like GET).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::DEFAULT_RESOURCE;

/// Classification of one raw HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// WebSocket upgrade; carries the client's `Sec-WebSocket-Key`
    Upgrade { key: String },
    /// Plain resource fetch, path already resolved to a resource name
    Resource { path: String },
}

/// Classify a raw request.
///
/// The request is split on CRLF. The first line must carry at least two
/// space-separated tokens (`METHOD PATH ...`). A request whose `Upgrade`
/// header contains `websocket` (both compared case-insensitively) is an
/// upgrade and must also carry `Sec-WebSocket-Key`; anything else resolves
/// to a named resource, with an empty or `/` path mapping to
/// [`DEFAULT_RESOURCE`].
///
/// Header names are kept as their exact text for lookup (last occurrence
/// wins); only the upgrade detection itself ignores case.
pub fn classify(raw: &str) -> Result<RequestKind> {
    let mut lines = raw.split("\r\n");

    let request_line = lines.next().ok_or(Error::InvalidHttp("empty request"))?;
    let parts: Vec<&str> = request_line.split(' ').collect();
    if parts.len() < 2 {
        return Err(Error::InvalidHttp("malformed request line"));
    }
    let path = parts[1];

    let mut headers: HashMap<&str, &str> = HashMap::new();
    let mut upgrade = false;
    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("upgrade")
            && value.to_ascii_lowercase().contains("websocket")
        {
            upgrade = true;
        }
        headers.insert(name, value);
    }

    if upgrade {
        let key = headers
            .get("Sec-WebSocket-Key")
            .ok_or(Error::HandshakeFailed("missing Sec-WebSocket-Key"))?;
        return Ok(RequestKind::Upgrade {
            key: key.trim().to_string(),
        });
    }

    Ok(RequestKind::Resource {
        path: resolve_resource_name(path),
    })
}

/// Strip the leading `/`; empty and `/` map to the default resource.
fn resolve_resource_name(path: &str) -> String {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.is_empty() {
        DEFAULT_RESOURCE.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_is_default_resource() {
        let kind = classify("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(
            kind,
            RequestKind::Resource {
                path: "index".to_string()
            }
        );
    }

    #[test]
    fn test_named_resource() {
        let kind = classify("GET /styles.css HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(
            kind,
            RequestKind::Resource {
                path: "styles.css".to_string()
            }
        );
    }

    #[test]
    fn test_method_is_ignored() {
        let kind = classify("POST /app.js HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(
            kind,
            RequestKind::Resource {
                path: "app.js".to_string()
            }
        );
    }

    #[test]
    fn test_upgrade_request() {
        let raw = "GET / HTTP/1.1\r\n\
                   Host: 192.168.1.10:3737\r\n\
                   Upgrade: websocket\r\n\
                   Connection: Upgrade\r\n\
                   Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                   Sec-WebSocket-Version: 13\r\n\
                   \r\n";
        let kind = classify(raw).unwrap();
        assert_eq!(
            kind,
            RequestKind::Upgrade {
                key: "dGhlIHNhbXBsZSBub25jZQ==".to_string()
            }
        );
    }

    #[test]
    fn test_upgrade_detection_is_case_insensitive() {
        let raw = "GET / HTTP/1.1\r\n\
                   UPGRADE: WebSocket\r\n\
                   Sec-WebSocket-Key: abc123==\r\n\
                   \r\n";
        let kind = classify(raw).unwrap();
        assert_eq!(
            kind,
            RequestKind::Upgrade {
                key: "abc123==".to_string()
            }
        );
    }

    #[test]
    fn test_upgrade_without_key_is_malformed() {
        let raw = "GET / HTTP/1.1\r\nUpgrade: websocket\r\n\r\n";
        assert!(matches!(classify(raw), Err(Error::HandshakeFailed(_))));
    }

    #[test]
    fn test_last_header_occurrence_wins() {
        let raw = "GET / HTTP/1.1\r\n\
                   Upgrade: websocket\r\n\
                   Sec-WebSocket-Key: first==\r\n\
                   Sec-WebSocket-Key: second==\r\n\
                   \r\n";
        let kind = classify(raw).unwrap();
        assert_eq!(
            kind,
            RequestKind::Upgrade {
                key: "second==".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_request_line() {
        assert!(matches!(
            classify("GET\r\n\r\n"),
            Err(Error::InvalidHttp(_))
        ));
        assert!(matches!(classify(""), Err(Error::InvalidHttp(_))));
    }
}
