use colored::Colorize;
use crxaudit::{command_argument_builder, handle_fetch, handle_lookup, handle_submit};
use crxaudit_client::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let chosen_command = command_argument_builder().get_matches();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight requests");
            ctrl_c.cancel();
        }
    });

    let outcome = match chosen_command.subcommand() {
        Some(("submit", primary_command)) => {
            handle_submit(primary_command, cancel).await.map(|_| ())
        }
        Some(("fetch", primary_command)) => handle_fetch(primary_command, cancel).await.map(|_| ()),
        Some(("lookup", primary_command)) => {
            handle_lookup(primary_command, cancel).await.map(|_| ())
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
