// ABOUTME: CLI commands for analyzing meal photos and listing history
// ABOUTME: Shows cached meals first, then refreshes from the server unless offline

use calvision_client::{AppController, ClientError, ImageUpload, MealRecord, RefreshOutcome};
use colored::*;
use std::path::Path;

use super::utils::{meals_table, print_meal};

pub async fn analyze_command(
    controller: &AppController,
    image: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if controller.session().is_none() {
        return Err(ClientError::Unauthenticated.into());
    }

    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| format!("Cannot read {}: {}", image.display(), e))?;
    let file_name = image
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "meal.jpg".to_string());
    let upload = ImageUpload::new(bytes, file_name);

    println!("{}", "Analyzing photo...".cyan());
    let record = match controller.submit_photo(upload).await {
        Ok(record) => record,
        Err(e) => {
            let message = controller
                .state()
                .message
                .unwrap_or_else(|| e.to_string());
            return Err(message.into());
        }
    };

    println!("{} Analysis complete", "✓".green().bold());
    println!();
    print_meal(&record);
    Ok(())
}

pub async fn meals_command(
    controller: &AppController,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if controller.session().is_none() {
        return Err(ClientError::Unauthenticated.into());
    }

    let refresh = if offline {
        None
    } else {
        controller.spawn_refresh()
    };

    let cached = controller.state().meals;
    print_meals(&cached);

    let Some(handle) = refresh else {
        return Ok(());
    };

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => RefreshOutcome::Failed(ClientError::api(format!("refresh task failed: {}", e))),
    };
    controller.reload_meals();

    match outcome {
        RefreshOutcome::Replaced { count } => {
            println!();
            println!("{} Fetched {} meals", "✓".green().bold(), count);
            let meals = controller.state().meals;
            if meals != cached {
                print_meals(&meals);
            }
        }
        RefreshOutcome::Superseded => {}
        RefreshOutcome::Failed(e) => {
            let insecure = controller.endpoint().insecure();
            eprintln!(
                "{} Showing cached meals: {}",
                "⚠".yellow(),
                e.user_message(insecure)
            );
        }
    }
    Ok(())
}

fn print_meals(meals: &[MealRecord]) {
    if meals.is_empty() {
        println!("{}", "No meals yet. Analyze a photo to get started.".yellow());
        return;
    }

    println!("{}", meals_table(meals));
    let total: i64 = meals.iter().filter_map(|m| m.rounded_calories()).sum();
    println!(
        "Total: {} meals, {} kcal",
        meals.len().to_string().cyan(),
        total.to_string().cyan()
    );
}
