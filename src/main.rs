use clap::Parser;
use patchrelay::cli::{self, Args};
use patchrelay::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logging = logging::init(&args)?;
    cli::run(args).await
}
