//! Standalone relay binary
//!
//! Plays the surrounding-application role for the library: supplies a
//! minimal web client as the `index` resource, logs every received message
//! where the real application would write the clipboard, and runs the relay
//! until ctrl-c.
//!
//! Run with: cargo run --bin relay
//! Port override: CLIPRELAY_PORT=8080 cargo run --bin relay

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cliprelay::resources::{Resource, ResourceMap};
use cliprelay::{Config, RelayServer, Result, DEFAULT_PORT};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>cliprelay</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 480px; margin: 2rem auto; padding: 0 1rem; }
    textarea { width: 100%; box-sizing: border-box; min-height: 6rem; font-size: 1rem; }
    button { margin-top: 0.5rem; padding: 0.6rem 1.4rem; font-size: 1rem; }
    #status { float: right; color: #888; }
    #log div { padding: 0.4rem 0; border-bottom: 1px solid #eee; word-break: break-all; }
  </style>
</head>
<body>
  <h1>cliprelay <span id="status">connecting</span></h1>
  <textarea id="content" placeholder="Text to send to the desktop"></textarea>
  <button id="send">Send</button>
  <div id="log"></div>
  <script>
    let ws;
    const status = document.getElementById("status");
    const content = document.getElementById("content");
    function connect() {
      ws = new WebSocket("ws://" + location.host);
      ws.onopen = () => { status.textContent = "connected"; };
      ws.onclose = () => { status.textContent = "disconnected"; setTimeout(connect, 3000); };
      ws.onmessage = (e) => {
        const entry = document.createElement("div");
        entry.textContent = e.data;
        document.getElementById("log").prepend(entry);
      };
    }
    document.getElementById("send").onclick = () => {
      if (ws && ws.readyState === WebSocket.OPEN && content.value.trim()) {
        ws.send(content.value.trim());
        content.value = "";
      }
    };
    connect();
  </script>
</body>
</html>
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port = std::env::var("CLIPRELAY_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let mut resources = ResourceMap::new();
    resources.insert(
        "index",
        Resource::new("text/html; charset=utf-8", INDEX_HTML),
    );

    let server = RelayServer::new(
        Config::builder().port(port).build(),
        Arc::new(resources),
        Arc::new(|text: &str| info!(len = text.len(), "clipboard text received: {text}")),
    );

    server.start().await?;
    info!(port = port, "open http://<this-host>:{port} from your phone");

    tokio::signal::ctrl_c().await.map_err(cliprelay::Error::Io)?;
    server.stop();
    Ok(())
}
