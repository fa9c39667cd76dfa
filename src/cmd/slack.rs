use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::services::NotificationChannel;

#[derive(Args, Debug, Clone)]
pub struct SlackArgs {
    /// Message body. Markdown bold, headings and bullets are converted.
    #[arg(short, long)]
    pub message: String,
    /// Header line; derived from the first line of the message when omitted.
    #[arg(short, long)]
    pub title: Option<String>,
}

pub async fn run(ctx: &AppContext, args: SlackArgs, cancel: &CancellationToken) -> AppResult<()> {
    let slack = ctx.require_slack()?;

    match args.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => slack.send_with_header(title, &args.message, cancel).await?,
        None => slack.send_text(&args.message, cancel).await?,
    }

    println!("Message sent to Slack.");
    Ok(())
}
