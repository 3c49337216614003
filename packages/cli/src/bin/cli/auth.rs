// ABOUTME: CLI commands for signing up, logging in and out
// ABOUTME: Prompts for missing credentials and reports the active session

use calvision_client::AppController;
use colored::*;
use inquire::{Password, Text};

use super::utils::meals_table;

fn prompt_or(value: Option<String>, label: &str) -> Result<String, Box<dyn std::error::Error>> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Text::new(label).prompt()?),
    }
}

fn failure(controller: &AppController) -> Box<dyn std::error::Error> {
    controller
        .state()
        .message
        .unwrap_or_else(|| "Request failed".to_string())
        .into()
}

pub async fn signup_command(
    controller: &AppController,
    name: Option<String>,
    email: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = prompt_or(name, "Name:")?;
    let email = prompt_or(email, "Email:")?;
    let password = Password::new("Password:").prompt()?;

    println!("{}", "Creating account...".cyan());
    let user = match controller.signup(&name, &email, password).await {
        Ok(user) => user,
        Err(_) => return Err(failure(controller)),
    };

    println!(
        "{} Signed up and logged in as {}",
        "✓".green().bold(),
        user.email.bold()
    );
    Ok(())
}

pub async fn login_command(
    controller: &AppController,
    email: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = prompt_or(email, "Email:")?;
    let password = Password::new("Password:")
        .without_confirmation()
        .prompt()?;

    let user = match controller.login(&email, password).await {
        Ok(user) => user,
        Err(_) => return Err(failure(controller)),
    };

    println!("{} Logged in as {}", "✓".green().bold(), user.email.bold());

    let meals = controller.state().meals;
    if !meals.is_empty() {
        println!();
        println!("{}", "Recent meals".bold());
        println!("{}", meals_table(&meals));
    }
    Ok(())
}

pub fn logout_command(controller: &AppController) -> Result<(), Box<dyn std::error::Error>> {
    if controller.session().is_none() {
        println!("{}", "Not logged in".yellow());
        return Ok(());
    }

    controller.logout()?;
    println!("{} Logged out", "✓".green().bold());
    Ok(())
}

pub fn whoami_command(controller: &AppController) -> Result<(), Box<dyn std::error::Error>> {
    match controller.session() {
        Some(user) => {
            println!("{} {}", "Name:".cyan(), user.name);
            println!("{} {}", "Email:".cyan(), user.email);
            println!("{} {}", "User ID:".cyan(), user.user_id);
        }
        None => println!("{}", "Not logged in".yellow()),
    }
    Ok(())
}
