//! UDS JSON-RPC client for CLI subcommands.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{Duration, timeout};

/// Queries wait behind in-flight enforcement passes, so give the daemon
/// a little room before declaring it unresponsive.
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) async fn rpc_call(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    timeout(RPC_TIMEOUT, rpc_call_inner(socket_path, method, params))
        .await
        .map_err(|_| anyhow::anyhow!("daemon at {socket_path} did not answer in {RPC_TIMEOUT:?}"))?
}

async fn rpc_call_inner(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to daemon at {socket_path}: {e}"))?;

    let (reader, mut writer) = stream.into_split();

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    let mut req = serde_json::to_string(&request)?;
    req.push('\n');
    writer.write_all(req.as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response: serde_json::Value = serde_json::from_str(line.trim())?;

    if let Some(error) = response.get("error") {
        anyhow::bail!("RPC error: {error}");
    }

    Ok(response["result"].clone())
}

/// `tabcap status` — limit, counts, stats, recent evictions.
pub async fn cmd_status(socket_path: &str) -> anyhow::Result<()> {
    let status = rpc_call(socket_path, "status", serde_json::json!({})).await?;
    print!("{}", format_status(&status));
    Ok(())
}

/// Pure formatting logic, separated for testability.
pub(crate) fn format_status(status: &serde_json::Value) -> String {
    let stats = &status["stats"];
    let mut out = String::new();
    out.push_str(&format!(
        "max tabs:       {}\n",
        status["max_tabs"].as_i64().unwrap_or(0)
    ));
    out.push_str(&format!(
        "open tabs:      {}\n",
        status["open_tabs"].as_u64().unwrap_or(0)
    ));
    out.push_str(&format!(
        "evictions:      {}\n",
        stats["evictions"].as_u64().unwrap_or(0)
    ));
    out.push_str(&format!(
        "close failures: {}\n",
        stats["close_failures"].as_u64().unwrap_or(0)
    ));
    out.push_str(&format!(
        "dirty skips:    {}\n",
        stats["skipped_dirty"].as_u64().unwrap_or(0)
    ));

    if let Some(recent) = status["recent_evictions"].as_array()
        && !recent.is_empty()
    {
        out.push_str("recent evictions:\n");
        for note in recent {
            out.push_str(&format!(
                "  {}  opened {}  trigger {}\n",
                note["tab"].as_str().unwrap_or("?"),
                note["opened_at"].as_str().unwrap_or("?"),
                note["trigger"].as_str().unwrap_or("?"),
            ));
        }
    }

    out
}

/// `tabcap tabs` — tracked tabs, one per line.
pub async fn cmd_tabs(socket_path: &str) -> anyhow::Result<()> {
    let tabs = rpc_call(socket_path, "list_tabs", serde_json::json!({})).await?;
    print!("{}", format_tab_list(&tabs));
    Ok(())
}

/// Pure formatting logic, separated for testability.
pub(crate) fn format_tab_list(tabs: &serde_json::Value) -> String {
    let arr = match tabs.as_array() {
        Some(a) if !a.is_empty() => a,
        _ => return "no tabs tracked\n".to_string(),
    };

    let mut out = String::new();
    for tab in arr {
        out.push_str(&format!(
            "{}  {}\n",
            tab["opened_at"].as_str().unwrap_or("?"),
            tab["tab"].as_str().unwrap_or("?"),
        ));
    }
    out
}

/// `tabcap set-limit N`: change the cap on a running daemon.
pub async fn cmd_set_limit(socket_path: &str, max_tabs: i64) -> anyhow::Result<()> {
    let params = serde_json::json!({"max_tabs": max_tabs});
    rpc_call(socket_path, "limit_changed", params).await?;
    println!("max tabs set to {max_tabs}");
    Ok(())
}

/// `tabcap notify opened|closed --tab H`: report a lifecycle event on
/// behalf of a host integration script.
pub async fn cmd_notify(socket_path: &str, method: &str, tab: &str) -> anyhow::Result<()> {
    let params = serde_json::json!({"tab": tab});
    rpc_call(socket_path, method, params).await?;
    Ok(())
}
