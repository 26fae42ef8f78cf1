use clap::{Parser, Subcommand};
use mbot_helper::{bot, config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mbot-helper",
    about = "Mattermost bot that answers keyword pings in its debugging channel"
)]
struct Cli {
    /// Config file (defaults to ~/.config/mbot-helper/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, set up the debugging channel and answer events (default)
    Run,
    /// Check that the Mattermost server is reachable
    Ping,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = match cli.config {
        Some(ref path) => config::Config::load_from_path(path),
        None => config::Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            if let Err(e) = rt.block_on(bot::run_bot(config)) {
                eprintln!("Bot error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Ping => match rt.block_on(bot::ping(&config)) {
            Ok(version) => println!("Server is running version {version}"),
            Err(e) => {
                eprintln!("Ping error: {e}");
                std::process::exit(1);
            }
        },
    }
}
