use clap::Parser;
use hackrx_supervisor::cli::Cli;
use std::process::exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = cli.run().await;

    exit(code)
}
