pub mod commands;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "planos",
    about = "Plan approval workflow CLI",
    long_about = "Operate the convention-center plan approval workflow: migrations, demo \
                  fixtures, request status, approvals, rejections, and plan uploads.",
    after_help = "Examples:\n  planos migrate\n  planos status SOL-001\n  planos approve SOL-001 --user u-luis --name \"Luis Vega\" --email luis@example.com --roles sostenibilidad"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Identity of the person acting on a request, as seen by the workflow.
#[derive(Debug, Args)]
pub struct ActorArgs {
    #[arg(long, help = "Acting user id")]
    pub user: String,
    #[arg(long, help = "Acting user display name")]
    pub name: String,
    #[arg(long, help = "Acting user email address")]
    pub email: String,
    #[arg(long, value_delimiter = ',', help = "Roles held by the acting user")]
    pub roles: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo requests, skipping ones already present")]
    Seed,
    #[command(about = "Show one request as JSON, or list all requests with an optional filter")]
    Status {
        #[arg(help = "Request id to inspect; omit to list")]
        request_id: Option<String>,
        #[arg(long, help = "Limit the listing to one status (pendiente|en_revision|aprobado|rechazado)")]
        filter: Option<String>,
    },
    #[command(about = "Approve the active group's review step on a request")]
    Approve {
        request_id: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Reject the active group's review step, returning the request for document correction")]
    Reject {
        request_id: String,
        #[arg(long, help = "Reason given by the rejecting reviewer")]
        reason: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(about = "Attach a plan document to a request, or remove one with --remove")]
    Upload {
        request_id: String,
        #[arg(long, help = "Plan document name")]
        plan: String,
        #[arg(long, default_value = "", help = "Download URL of the uploaded document")]
        url: String,
        #[arg(long, default_value_t = 0, help = "Document size in bytes")]
        size: u64,
        #[arg(long, help = "Remove the named document instead of adding it")]
        remove: bool,
        #[command(flatten)]
        actor: ActorArgs,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Status { request_id, filter } => {
            commands::status::run(request_id.as_deref(), filter.as_deref())
        }
        Command::Approve { request_id, actor } => commands::approve::run(&request_id, &actor),
        Command::Reject { request_id, reason, actor } => {
            commands::reject::run(&request_id, &reason, &actor)
        }
        Command::Upload { request_id, plan, url, size, remove, actor } => {
            commands::upload::run(&request_id, &plan, &url, size, remove, &actor)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
