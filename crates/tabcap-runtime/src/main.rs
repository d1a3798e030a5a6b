//! tabcap: editor tab cap enforcement binary.
//! Single-process daemon plus thin client subcommands over a UDS socket.

use clap::Parser;

mod cli;
mod client;
mod event_loop;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);

    match args.command {
        cli::Command::Daemon(opts) => {
            let filter = std::env::var("TABCAP_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("tabcap daemon starting");

            event_loop::run_daemon(opts, &socket_path).await?;
        }
        cli::Command::Status => {
            client::cmd_status(&socket_path).await?;
        }
        cli::Command::Tabs => {
            client::cmd_tabs(&socket_path).await?;
        }
        cli::Command::SetLimit(opts) => {
            client::cmd_set_limit(&socket_path, opts.max_tabs).await?;
        }
        cli::Command::Notify { kind } => {
            let (method, opts) = match kind {
                cli::NotifyKind::Opened(opts) => ("tab_opened", opts),
                cli::NotifyKind::Closed(opts) => ("tab_closed", opts),
            };
            client::cmd_notify(&socket_path, method, &opts.tab).await?;
        }
    }

    Ok(())
}
