use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::cmd::backlog::{describe_receipt, resolve_project};
use crate::context::AppContext;
use crate::domain::message::Message;
use crate::domain::ticket::TicketOptions;
use crate::error::AppResult;
use crate::workflow::notify::{Delivery, DispatchReport, TicketTarget};

#[derive(Args, Debug, Clone)]
pub struct DeliveryArgs {
    /// Create a ticket on channels that support it.
    #[arg(long)]
    pub ticket: bool,
    /// Project id or key for ticket delivery. Defaults to BACKLOG_PROJECT_ID.
    #[arg(short, long)]
    pub project: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[arg(short, long)]
    pub message: String,
    #[arg(short, long)]
    pub title: Option<String>,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct UrlArgs {
    /// Page to extract and forward.
    pub url: String,
    #[command(flatten)]
    pub delivery: DeliveryArgs,
}

pub async fn run_send(
    ctx: &AppContext,
    args: SendArgs,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let notifier = ctx.notifier()?;
    let delivery = delivery(ctx, &args.delivery, cancel).await?;
    let message = Message::new(args.title.as_deref(), &args.message);

    let report = notifier.dispatch(&message, &delivery, cancel).await?;
    print_report(&report);
    Ok(())
}

pub async fn run_url(ctx: &AppContext, args: UrlArgs, cancel: &CancellationToken) -> AppResult<()> {
    let notifier = ctx.notifier()?;
    let delivery = delivery(ctx, &args.delivery, cancel).await?;

    let report = notifier.notify_from_url(&args.url, &delivery, cancel).await?;
    print_report(&report);
    Ok(())
}

async fn delivery(
    ctx: &AppContext,
    args: &DeliveryArgs,
    cancel: &CancellationToken,
) -> AppResult<Delivery> {
    if !args.ticket {
        return Ok(Delivery::Text);
    }
    let project_id = resolve_project(ctx, args.project.as_deref(), cancel).await?;
    Ok(Delivery::Ticket(TicketTarget {
        project_id,
        options: TicketOptions::default(),
    }))
}

fn print_report(report: &DispatchReport) {
    for delivered in &report.delivered {
        match &delivered.receipt {
            Some(receipt) => println!("{}: {}", delivered.channel, describe_receipt(receipt)),
            None => println!("{}: delivered", delivered.channel),
        }
    }
}
