use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use calvision_client::{AppController, ClientSettings};
use cli::endpoint::EndpointCommands;

#[derive(Parser)]
#[command(name = "calvision")]
#[command(about = "Calorie Vision - photo based meal logging")]
#[command(version)]
struct Cli {
    /// Log client activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Log in with an existing account
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the saved session and cached meals
    Logout,
    /// Show the logged in user
    Whoami,
    /// Analyze a meal photo
    Analyze {
        /// Path to a JPEG, PNG or similar image
        image: PathBuf,
    },
    /// List recent meals, cached first and then refreshed from the server
    Meals {
        /// Show only the cached meals
        #[arg(long)]
        offline: bool,
    },
    /// Check whether the backend is reachable
    Status {
        /// Keep probing and print each connectivity change until Ctrl+C
        #[arg(long)]
        watch: bool,
        /// Seconds between probes in watch mode
        #[arg(long, default_value = "10")]
        interval: u64,
    },
    /// Show or change the backend address
    #[command(subcommand)]
    Endpoint(EndpointCommands),
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "calvision_client=debug,calvision=debug"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match handle_command(cli.command).await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

async fn handle_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let settings = ClientSettings::from_env()?;
    let controller = AppController::open(&settings)?;
    controller.restore();

    match command {
        Commands::Signup { name, email } => {
            cli::auth::signup_command(&controller, name, email).await
        }
        Commands::Login { email } => cli::auth::login_command(&controller, email).await,
        Commands::Logout => cli::auth::logout_command(&controller),
        Commands::Whoami => cli::auth::whoami_command(&controller),
        Commands::Analyze { image } => cli::meals::analyze_command(&controller, &image).await,
        Commands::Meals { offline } => cli::meals::meals_command(&controller, offline).await,
        Commands::Status { watch, interval } => {
            if watch {
                cli::endpoint::watch_status_command(&controller, interval).await
            } else {
                cli::endpoint::status_command(&controller).await
            }
        }
        Commands::Endpoint(endpoint_cmd) => {
            cli::endpoint::handle_endpoint_command(&controller, endpoint_cmd)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meals_refreshes_unless_offline() {
        let cli = Cli::try_parse_from(["calvision", "meals"]).unwrap();
        assert!(matches!(cli.command, Commands::Meals { offline: false }));

        let cli = Cli::try_parse_from(["calvision", "meals", "--offline"]).unwrap();
        assert!(matches!(cli.command, Commands::Meals { offline: true }));
    }

    #[test]
    fn test_status_watch_flags() {
        let cli = Cli::try_parse_from(["calvision", "status", "--watch", "--interval", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Status {
                watch: true,
                interval: 3
            }
        ));
    }
}
