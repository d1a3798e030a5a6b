//! Event loop: the single consumer that owns the coordinator.
//!
//! Host notifications and client queries funnel through one bounded
//! channel; one blocking task drains it in delivery order, so handler
//! bodies never interleave and host bridge calls (sync subprocesses)
//! stay off the async worker threads.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use tabcap_core::config::TabLimit;
use tabcap_core::host::HostAdapter;
use tabcap_core::types::{EventKind, TabEvent};
use tabcap_daemon::coordinator::{CloseAttempt, Coordinator, PassOutcome};
use tabcap_host::HostCommandBridge;

use crate::cli::DaemonOpts;
use crate::server;

/// Message into the consumer: a host notification or a read query.
#[derive(Debug)]
pub enum ControlMsg {
    Event(TabEvent),
    Status(oneshot::Sender<serde_json::Value>),
    ListTabs(oneshot::Sender<serde_json::Value>),
}

/// Spawn the consumer task. The loop exits once every sender is dropped
/// and the queue is drained.
pub fn spawn_event_loop<A>(
    host: A,
    limit: TabLimit,
    queue_depth: usize,
) -> (mpsc::Sender<ControlMsg>, tokio::task::JoinHandle<()>)
where
    A: HostAdapter + 'static,
{
    let (tx, rx) = mpsc::channel(queue_depth);
    let handle = tokio::task::spawn_blocking(move || consume(rx, host, limit));
    (tx, handle)
}

fn consume<A: HostAdapter>(mut rx: mpsc::Receiver<ControlMsg>, host: A, limit: TabLimit) {
    let mut coordinator = Coordinator::new(limit);

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            ControlMsg::Event(event) => {
                if let TabEvent::Closed { handle } = &event
                    && !coordinator.contains(handle)
                {
                    tracing::debug!("close for untracked tab {handle}");
                }
                let trigger = event.kind();
                let pass = coordinator.apply(event, Utc::now(), &host);
                log_pass(trigger, &pass);
            }
            ControlMsg::Status(reply) => {
                let _ = reply.send(build_status(&coordinator));
            }
            ControlMsg::ListTabs(reply) => {
                let _ = reply.send(build_tab_list(&coordinator));
            }
        }
    }

    tracing::debug!("event queue drained, exiting");
}

fn log_pass(trigger: EventKind, pass: &PassOutcome) {
    match &pass.close {
        CloseAttempt::Requested(handle) => {
            if let Some(victim) = pass.victim() {
                tracing::info!(
                    "evicting tab {handle} (opened {}, preview: {}, trigger: {trigger})",
                    victim.opened_at,
                    victim.preview
                );
            }
        }
        CloseAttempt::Failed(handle) => {
            tracing::warn!("host failed to close tab {handle} (trigger: {trigger})");
        }
        CloseAttempt::NotNeeded => match &pass.outcome {
            Some(outcome) if outcome.over_limit => tracing::warn!(
                "over limit with no evictable tab ({} open, {} dirty, {} unqueryable)",
                outcome.open_count,
                outcome.skipped_dirty,
                outcome.skipped_unqueryable
            ),
            Some(_) => tracing::debug!("pass clean (trigger: {trigger})"),
            None => tracing::debug!("no pass needed (trigger: {trigger})"),
        },
    }
}

// ─── Read-side builders ───────────────────────────────────────────

/// Build the `status` response: limit, counts, stats, recent evictions.
pub(crate) fn build_status(coordinator: &Coordinator) -> serde_json::Value {
    let stats = coordinator.stats();
    let evictions: Vec<serde_json::Value> = coordinator
        .recent_evictions()
        .iter()
        .map(|note| {
            serde_json::json!({
                "tab": note.handle,
                "opened_at": note.opened_at,
                "evicted_at": note.evicted_at,
                "preview": note.preview,
                "trigger": note.trigger,
            })
        })
        .collect();

    serde_json::json!({
        "max_tabs": coordinator.limit().max_tabs,
        "open_tabs": coordinator.open_tabs(),
        "version": coordinator.version(),
        "stats": {
            "events": stats.events,
            "passes": stats.passes,
            "evictions": stats.evictions,
            "close_failures": stats.close_failures,
            "skipped_dirty": stats.skipped_dirty,
            "skipped_unqueryable": stats.skipped_unqueryable,
            "ignored_closes": stats.ignored_closes,
        },
        "recent_evictions": evictions,
    })
}

/// Build the `list_tabs` response: tracked tabs sorted by handle.
pub(crate) fn build_tab_list(coordinator: &Coordinator) -> serde_json::Value {
    let tabs: Vec<serde_json::Value> = coordinator
        .snapshot()
        .iter()
        .map(|record| {
            serde_json::json!({
                "tab": record.handle,
                "opened_at": record.opened_at,
            })
        })
        .collect();
    serde_json::Value::Array(tabs)
}

// ─── Daemon wiring ────────────────────────────────────────────────

/// Run the daemon: host bridge + event loop + UDS server, until a
/// shutdown signal arrives.
pub async fn run_daemon(opts: DaemonOpts, socket_path: &str) -> anyhow::Result<()> {
    let bridge = HostCommandBridge::new(&opts.host_cmd);
    let limit = TabLimit::new(opts.max_tabs);
    tracing::info!(
        "enforcing max_tabs={} via host command {:?}",
        opts.max_tabs,
        opts.host_cmd
    );

    let (tx, loop_handle) = spawn_event_loop(bridge, limit, opts.queue_depth);

    // Start UDS server
    let server_tx = tx.clone();
    let server_socket = socket_path.to_string();
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(&server_socket, server_tx).await {
            tracing::error!("UDS server error: {e}");
        }
    });

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = &mut server_handle => {
            tracing::warn!("server exited unexpectedly");
        }
    }

    // Stop intake, then let the consumer drain its queue and exit.
    server_handle.abort();
    drop(tx);
    let _ = loop_handle.await;

    // Cleanup socket
    let _ = std::fs::remove_file(socket_path);
    tracing::info!("daemon stopped");
    Ok(())
}
