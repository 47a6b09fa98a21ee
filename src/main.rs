use clap::Parser;
use env_logger::Env;
use log::error;
use sqlrag::client::cli::Cli;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = cli.run().await {
        error!("{e}");
        std::process::exit(1);
    }
}
