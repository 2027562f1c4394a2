use crate::demo::{run_demo, run_templates, DemoArgs, TemplatesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use safety_checklist::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Safety Checklist Service",
    about = "Run or demonstrate the pre-work safety checklist service from the command line",
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
    /// Print the published checklist templates
    Templates(TemplatesArgs),
    /// Walk a checklist from draft through submission, a contested review, and the manager view
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
        Command::Templates(args) => run_templates(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
