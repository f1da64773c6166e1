use clap::Parser;
use game_arcade::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(error) = game_arcade::run_with_config(cli).await {
        eprintln!("fatal: {error}");
        std::process::exit(1);
    }
}
