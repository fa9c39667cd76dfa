use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::AppContext;
use crate::domain::ticket::{IssueKey, ProjectRef, TicketOptions, TicketReceipt, TicketRequest};
use crate::error::{AppError, AppResult};
use crate::services::NotificationChannel;

#[derive(Args, Debug, Clone)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct BacklogArgs {
    #[command(subcommand)]
    pub command: Option<BacklogCommand>,
    #[command(flatten)]
    pub create: CreateArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BacklogCommand {
    /// Add a comment to an existing issue.
    Comment(CommentArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Issue summary.
    #[arg(short, long, required = true)]
    pub title: Option<String>,
    /// Issue description.
    #[arg(short, long, required = true)]
    pub message: Option<String>,
    /// Project id or key. Defaults to BACKLOG_PROJECT_ID.
    #[arg(short, long)]
    pub project: Option<String>,
    #[arg(long)]
    pub issue_type_id: Option<i64>,
    #[arg(long)]
    pub priority_id: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    /// Issue key, e.g. PROJ-123.
    #[arg(short, long)]
    pub issue_id: String,
    #[arg(short, long)]
    pub message: String,
}

pub async fn run(ctx: &AppContext, args: BacklogArgs, cancel: &CancellationToken) -> AppResult<()> {
    match args.command {
        Some(BacklogCommand::Comment(comment)) => run_comment(ctx, comment, cancel).await,
        None => run_create(ctx, args.create, cancel).await,
    }
}

async fn run_create(
    ctx: &AppContext,
    args: CreateArgs,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let backlog = ctx.require_backlog()?;
    let project_id = resolve_project(ctx, args.project.as_deref(), cancel).await?;

    let ticket = TicketRequest {
        summary: args.title.unwrap_or_default(),
        description: args.message.unwrap_or_default(),
        project_id,
        options: TicketOptions {
            issue_type_id: args.issue_type_id,
            priority_id: args.priority_id,
        },
    };
    let receipt = backlog.send_ticket(&ticket, cancel).await?;

    println!("{}", describe_receipt(&receipt));
    Ok(())
}

async fn run_comment(
    ctx: &AppContext,
    args: CommentArgs,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let issue_key = IssueKey::parse(&args.issue_id)?;
    let backlog = ctx.require_backlog()?;
    backlog.post_comment(&issue_key, &args.message, cancel).await?;

    println!("Comment added to {}.", issue_key.as_str());
    Ok(())
}

/// Turns `-p` (or `BACKLOG_PROJECT_ID`) into a numeric project id, looking up keys.
pub async fn resolve_project(
    ctx: &AppContext,
    project: Option<&str>,
    cancel: &CancellationToken,
) -> AppResult<i64> {
    let raw = project
        .map(str::to_string)
        .or_else(|| ctx.config.default_project.clone())
        .ok_or_else(|| {
            AppError::Validation(
                "a project is required: pass -p or set BACKLOG_PROJECT_ID".to_string(),
            )
        })?;

    match ProjectRef::parse(&raw)? {
        ProjectRef::Id(id) => Ok(id),
        ProjectRef::Key(key) => {
            let id = ctx.require_backlog()?.resolve_project_id(&key, cancel).await?;
            info!(key = %key, id, "resolved project key");
            Ok(id)
        }
    }
}

pub fn describe_receipt(receipt: &TicketReceipt) -> String {
    match (&receipt.issue_key, &receipt.url) {
        (Some(key), Some(url)) => format!("Issue {key} created: {url}"),
        (Some(key), None) => format!("Issue {key} created."),
        _ => "Issue created.".to_string(),
    }
}
