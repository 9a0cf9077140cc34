//! Osprey - VTOL transition coordinator

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "osprey")]
#[command(about = "VTOL transition coordinator with a scenario harness")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CLI batch/single scenario mode
    Cli {
        /// Pass remaining arguments to osprey-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cli { args }) => {
            // Pass through to osprey-cli
            let cli_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            run_cli(&cli_args)
        }
        None => {
            tracing::info!("no subcommand given, running the default sweep");
            run_cli(&[])
        }
    }
}

fn run_cli(args: &[&str]) -> anyhow::Result<()> {
    // Convert args back to a format that can be parsed by the CLI
    let mut full_args = vec!["osprey-cli"];
    full_args.extend(args);

    // Parse and run the CLI
    match osprey_cli::run_cli_main(&full_args) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("CLI error: {}", e);
            std::process::exit(1);
        }
    }
}
