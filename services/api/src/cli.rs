use crate::demo::{run_demo, run_evaluate, run_rank, DemoArgs, EvaluateArgs, RankArgs};
use crate::server;
use candidate_eval::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Candidate Evaluation Engine",
    about = "Score, classify, and rank generated strategy candidates",
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
    /// Evaluate a single candidate read from a JSON file
    Evaluate(EvaluateArgs),
    /// Rank the candidates in a JSON array file without recording decisions
    Rank(RankArgs),
    /// Run a walkthrough over synthetic candidates of every kind
    Demo(DemoArgs),
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

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args),
        Command::Rank(args) => run_rank(args),
        Command::Demo(args) => run_demo(args),
    }
}
