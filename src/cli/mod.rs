pub mod args;
pub mod commands;

pub use args::{ConfigArgs, ServeArgs, SubmitArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "patchrelay")]
#[command(version = crate::VERSION)]
#[command(about = "Apply, commit, and push patches against cached git clones")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: describe keys and identities in config.toml, start `patchrelay serve`, then submit patches over HTTP or WebSocket."
)]
pub struct Args {
    /// Configuration file (default: PATCHRELAY_CONFIG or ./config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Run the HTTP/WebSocket service",
        long_about = "Serve exposes /api/health, /api/config, /api/submit and the /ws live channel.",
        after_help = "Example:\n    patchrelay serve --port 9000 --serve-frontend"
    )]
    Serve(ServeArgs),
    #[command(
        about = "Deliver one patch from the command line",
        long_about = "Submit runs a single submission through the same pipeline the service uses and prints its log.",
        after_help = "Example:\n    patchrelay submit --repository-url git@host:org/repo.git --patch-file fix.diff --commit-message \"Fix\""
    )]
    Submit(SubmitArgs),
    #[command(
        about = "Print the configuration summary",
        long_about = "Config prints the SSH key and git user registries as the UI sees them; key paths are never shown.",
        after_help = "Example:\n    patchrelay config --show-env"
    )]
    Config(ConfigArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    let config_path = args.config;
    match args.command {
        Command::Serve(serve_args) => commands::serve(config_path.as_deref(), serve_args).await,
        Command::Submit(submit_args) => commands::submit(config_path.as_deref(), submit_args).await,
        Command::Config(config_args) => commands::config(config_path.as_deref(), config_args).await,
    }
}
