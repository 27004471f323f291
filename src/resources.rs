//! Static resources served over plain HTTP
//!
//! The core never reads a filesystem: the surrounding application hands it
//! named, immutable byte blobs (the web client's page, styles, script) and
//! the server answers `GET /<name>` from that table.

use std::collections::HashMap;

use bytes::Bytes;

/// A named static payload: content type plus body bytes.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Value emitted verbatim as the `Content-Type` header
    pub content_type: String,
    /// Response body
    pub body: Bytes,
}

impl Resource {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Supplier of static content, implemented by the surrounding application.
pub trait ResourceProvider: Send + Sync + 'static {
    /// Resolve a resource name (already stripped of its leading `/`) to its
    /// content, or `None` for a 404.
    fn resolve(&self, path: &str) -> Option<Resource>;
}

/// Simple table-backed [`ResourceProvider`].
#[derive(Debug, Default)]
pub struct ResourceMap {
    entries: HashMap<String, Resource>,
}

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under a name (no leading `/`).
    pub fn insert(&mut self, name: impl Into<String>, resource: Resource) {
        self.entries.insert(name.into(), resource);
    }
}

impl ResourceProvider for ResourceMap {
    fn resolve(&self, path: &str) -> Option<Resource> {
        self.entries.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_hit_and_miss() {
        let mut map = ResourceMap::new();
        map.insert("index", Resource::new("text/html", "<h1>hi</h1>"));

        let hit = map.resolve("index").unwrap();
        assert_eq!(hit.content_type, "text/html");
        assert_eq!(hit.body.as_ref(), b"<h1>hi</h1>");

        assert!(map.resolve("missing.js").is_none());
    }
}
