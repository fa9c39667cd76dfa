mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cmd::backlog::{self as backlog_cmd, BacklogArgs};
use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::notify::{self as notify_cmd, SendArgs, UrlArgs};
use crate::cmd::slack::{self as slack_cmd, SlackArgs};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Parser)]
#[command(
    name = "notifier",
    author,
    version,
    about = "Send notifications to Slack and Backlog"
)]
struct Cli {
    /// Request timeout in seconds, overriding NOTIFIER_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a message to the Slack webhook.
    Slack(SlackArgs),
    /// Create a Backlog issue, or comment on one.
    Backlog(BacklogArgs),
    /// Send one message to every configured channel.
    Send(SendArgs),
    /// Extract a web page and send it to every configured channel.
    Url(UrlArgs),
    /// Inspect CLI configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notifier=info"));
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?.with_timeout(cli.timeout);
    let context = AppContext::new(config)?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Slack(args) => slack_cmd::run(&context, args, &cancel).await,
        Commands::Backlog(args) => backlog_cmd::run(&context, args, &cancel).await,
        Commands::Send(args) => notify_cmd::run_send(&context, args, &cancel).await,
        Commands::Url(args) => notify_cmd::run_url(&context, args, &cancel).await,
        Commands::Config(args) => config_cmd::run(&context.config, args.command),
    }
}
