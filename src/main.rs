use clap::Parser;
use todo_service::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = todo_service::run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
