//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tabcap", about = "editor tab cap enforcement")]
pub struct Cli {
    /// UDS socket path (default: $XDG_RUNTIME_DIR/tabcap/tabcapd.sock)
    #[arg(long, short = 's', global = true, env = "TABCAP_SOCKET")]
    pub socket_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the enforcement daemon (event loop + UDS server)
    Daemon(DaemonOpts),
    /// Show daemon status (limit, counts, recent evictions)
    Status,
    /// List tracked tabs with opened-at timestamps
    Tabs,
    /// Change the tab cap on a running daemon
    SetLimit(SetLimitOpts),
    /// Report a tab lifecycle event (for host integration scripts)
    Notify {
        #[command(subcommand)]
        kind: NotifyKind,
    },
}

#[derive(clap::Args)]
pub struct DaemonOpts {
    /// Helper executable used to query tab flags and close tabs
    #[arg(long, env = "TABCAP_HOST_CMD")]
    pub host_cmd: String,

    /// Initial cap on simultaneously open tabs
    #[arg(long, default_value_t = tabcap_core::DEFAULT_MAX_TABS, allow_hyphen_values = true)]
    pub max_tabs: i64,

    /// Event queue capacity
    #[arg(long, default_value_t = 256)]
    pub queue_depth: usize,
}

#[derive(clap::Args)]
pub struct SetLimitOpts {
    /// New cap; zero or negative evicts every closable tab
    #[arg(allow_hyphen_values = true)]
    pub max_tabs: i64,
}

#[derive(Subcommand)]
pub enum NotifyKind {
    /// Report a tab as opened
    Opened(NotifyOpts),
    /// Report a tab as closed
    Closed(NotifyOpts),
}

#[derive(clap::Args)]
pub struct NotifyOpts {
    /// Host tab handle
    #[arg(long)]
    pub tab: String,
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/tabcap/tabcapd.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/tabcap-{user}/tabcapd.sock")
}
