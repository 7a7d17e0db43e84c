//! nova - development server with on-demand bundling and live reload.

use clap::Parser;
use miette::Result;
use tracing::info;

mod cli;
mod error;
mod logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logger::init_logger(args.verbose, args.quiet, args.no_color);

    let result = run(&args).await;
    result.map_err(error::cli_error_to_miette)
}

async fn run(args: &cli::Cli) -> error::Result<()> {
    let config = args.to_serve_config()?;
    config.validate().map_err(error::CliError::Server)?;

    info!("Starting dev server at http://localhost:{}/", config.port);
    nova_server::serve(config).await?;
    Ok(())
}
