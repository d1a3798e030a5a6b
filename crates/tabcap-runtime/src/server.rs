//! UDS JSON-RPC server: minimal hand-rolled implementation.
//! Connection-per-request, newline-delimited JSON.
//!
//! Connections are handled inline in accept order. Handlers only
//! enqueue an event or wait for a read reply, and the inline handling
//! keeps host notifications in delivery order end to end.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};

use tabcap_core::types::{TabEvent, TabHandle};

use crate::event_loop::ControlMsg;

/// Peers write their single request right after connecting. Connections
/// are handled inline in accept order, so a socket that stays silent
/// must be dropped before it stalls intake for every peer behind it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the UDS JSON-RPC server.
pub async fn run_server(socket_path: &str, tx: mpsc::Sender<ControlMsg>) -> anyhow::Result<()> {
    // Create socket directory with mode 0700
    let socket_dir = std::path::Path::new(socket_path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid socket path"))?;

    if !socket_dir.exists() {
        std::fs::create_dir_all(socket_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    // Check for stale socket
    if std::path::Path::new(socket_path).exists() {
        if tokio::net::UnixStream::connect(socket_path).await.is_err() {
            std::fs::remove_file(socket_path)?;
            tracing::info!("removed stale socket at {socket_path}");
        } else {
            anyhow::bail!("another daemon is already running at {socket_path}");
        }
    }

    let listener = UnixListener::bind(socket_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("UDS server listening on {socket_path}");

    loop {
        let (stream, _) = listener.accept().await?;
        if let Err(e) = handle_connection(stream, &tx).await {
            tracing::debug!("connection error: {e}");
        }
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    tx: &mpsc::Sender<ControlMsg>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    timeout(REQUEST_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| anyhow::anyhow!("no request within {REQUEST_TIMEOUT:?}"))??;

    let request: serde_json::Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();
    let params = &request["params"];

    let response = match method {
        "tab_opened" | "tab_closed" | "limit_changed" => match parse_event(method, params) {
            Some(event) => {
                if tx.send(ControlMsg::Event(event)).await.is_err() {
                    rpc_error(&id, -32000, "daemon shutting down")
                } else {
                    rpc_result(&id, serde_json::json!({"accepted": true}))
                }
            }
            None => rpc_error(&id, -32602, "invalid params"),
        },
        "hello" => {
            // Adopt the host's already-open tabs, in list order, through
            // the ordinary opened path.
            let events = adoption_events(params);
            let adopted = events.len();
            let mut failed = false;
            for event in events {
                if tx.send(ControlMsg::Event(event)).await.is_err() {
                    failed = true;
                    break;
                }
            }
            if failed {
                rpc_error(&id, -32000, "daemon shutting down")
            } else {
                rpc_result(
                    &id,
                    serde_json::json!({"accepted": true, "adopted": adopted}),
                )
            }
        }
        "status" => match query(tx, ControlMsg::Status).await {
            Some(result) => rpc_result(&id, result),
            None => rpc_error(&id, -32000, "daemon shutting down"),
        },
        "list_tabs" => match query(tx, ControlMsg::ListTabs).await {
            Some(result) => rpc_result(&id, result),
            None => rpc_error(&id, -32000, "daemon shutting down"),
        },
        _ => rpc_error(&id, -32601, "method not found"),
    };

    let mut resp = serde_json::to_string(&response)?;
    resp.push('\n');
    writer.write_all(resp.as_bytes()).await?;

    Ok(())
}

async fn query<F>(tx: &mpsc::Sender<ControlMsg>, make: F) -> Option<serde_json::Value>
where
    F: FnOnce(oneshot::Sender<serde_json::Value>) -> ControlMsg,
{
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(make(reply_tx)).await.ok()?;
    reply_rx.await.ok()
}

/// Open events for a `hello` adoption list, in list order. Entries that
/// are not strings are dropped.
pub(crate) fn adoption_events(params: &serde_json::Value) -> Vec<TabEvent> {
    params["tabs"]
        .as_array()
        .map(|tabs| {
            tabs.iter()
                .filter_map(|tab| tab.as_str())
                .map(|tab| TabEvent::Opened {
                    handle: TabHandle::new(tab),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Map a notification method to its event, if the params are well formed.
pub(crate) fn parse_event(method: &str, params: &serde_json::Value) -> Option<TabEvent> {
    match method {
        "tab_opened" => params["tab"].as_str().map(|tab| TabEvent::Opened {
            handle: TabHandle::new(tab),
        }),
        "tab_closed" => params["tab"].as_str().map(|tab| TabEvent::Closed {
            handle: TabHandle::new(tab),
        }),
        "limit_changed" => params["max_tabs"]
            .as_i64()
            .map(|max_tabs| TabEvent::LimitChanged { max_tabs }),
        _ => None,
    }
}

pub(crate) fn rpc_result(id: &serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

pub(crate) fn rpc_error(id: &serde_json::Value, code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {"code": code, "message": message},
        "id": id,
    })
}
