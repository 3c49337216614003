// ABOUTME: CLI commands for inspecting and overriding the backend address
// ABOUTME: Includes the connectivity status check and watch loop

use calvision_client::{AppController, ConnectivityState};
use std::time::Duration;
use clap::Subcommand;
use colored::*;

use super::utils::{connectivity_label, print_endpoint};

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// Show the backend address in use and where it came from
    Show,
    /// Save a backend address that takes precedence over the environment
    Set {
        /// Base URL, e.g. https://api.example.com
        url: String,
    },
    /// Remove the saved backend address
    Reset,
}

pub fn handle_endpoint_command(
    controller: &AppController,
    command: EndpointCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        EndpointCommands::Show => {
            print_endpoint(&controller.endpoint());
            Ok(())
        }
        EndpointCommands::Set { url } => {
            let endpoint = controller.change_endpoint(&url)?;
            println!("{} Backend address saved", "✓".green().bold());
            print_endpoint(&endpoint);
            Ok(())
        }
        EndpointCommands::Reset => {
            let endpoint = controller.reset_endpoint()?;
            println!("{} Saved backend address removed", "✓".green().bold());
            print_endpoint(&endpoint);
            Ok(())
        }
    }
}

pub async fn status_command(controller: &AppController) -> Result<(), Box<dyn std::error::Error>> {
    print_endpoint(&controller.endpoint());

    let report = controller.probe().await;
    println!(
        "{} {} in {}ms",
        "Status:".cyan(),
        connectivity_label(&report.state),
        report.response_time_ms
    );

    match controller.session() {
        Some(user) => println!("{} {}", "Session:".cyan(), user.email),
        None => println!("{} {}", "Session:".cyan(), "not logged in".dimmed()),
    }
    Ok(())
}

pub async fn watch_status_command(
    controller: &AppController,
    interval_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    print_endpoint(&controller.endpoint());
    println!("{}", "Watching connectivity, press Ctrl+C to stop".dimmed());

    let mut changes = controller.subscribe_connectivity();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut last_printed: Option<ConnectivityState> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                controller.probe().await;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                if last_printed.as_ref() != Some(&state) {
                    println!("{} {}", "Status:".cyan(), connectivity_label(&state));
                    last_printed = Some(state);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }
    Ok(())
}
