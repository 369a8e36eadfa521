use crate::console::{list_requests, mark_requests_processed, show_request};
use crate::server;
use clap::{Args, Parser, Subcommand};
use refund_desk::error::AppError;
use refund_desk::refunds::{CreatedWithin, RequestId};

#[derive(Parser, Debug)]
#[command(
    name = "Refund Desk",
    about = "Run the refund request desk or inspect its store from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect and process stored refund requests
    Requests {
        #[command(subcommand)]
        command: RequestsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum RequestsCommand {
    /// List stored requests, newest first
    List(ListArgs),
    /// Show one request with card and account numbers masked
    Show {
        /// Request identifier (UUID)
        id: RequestId,
    },
    /// Mark pending requests as processed
    MarkProcessed {
        /// Request identifiers (UUIDs)
        #[arg(required = true)]
        ids: Vec<RequestId>,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ListArgs {
    /// Only processed (`true`) or pending (`false`) requests
    #[arg(long)]
    pub(crate) processed: Option<bool>,
    /// Exact bank name
    #[arg(long)]
    pub(crate) bank: Option<String>,
    /// today, past-seven-days, this-month, or this-year
    #[arg(long)]
    pub(crate) created: Option<CreatedWithin>,
    /// Case-insensitive match on request id, recipient, or bank
    #[arg(long)]
    pub(crate) search: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Requests {
            command: RequestsCommand::List(args),
        } => list_requests(args),
        Command::Requests {
            command: RequestsCommand::Show { id },
        } => show_request(id),
        Command::Requests {
            command: RequestsCommand::MarkProcessed { ids },
        } => mark_requests_processed(&ids),
    }
}
