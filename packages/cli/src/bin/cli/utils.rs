// ABOUTME: Shared terminal formatting for meals, endpoints and connectivity
// ABOUTME: Builds comfy tables and colored labels used across commands

use calvision_client::{ConnectivityState, EndpointConfig, EndpointSource, Macros, MealRecord};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

const NAME_WIDTH: usize = 30;
const INGREDIENTS_WIDTH: usize = 40;

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn grams(value: Option<f64>) -> String {
    match value {
        Some(g) => format!("{:.0}g", g),
        None => "—".to_string(),
    }
}

pub fn format_macros(macros: Option<&Macros>) -> String {
    match macros {
        Some(m) => format!(
            "C {} / P {} / F {}",
            grams(m.carbs_g),
            grams(m.protein_g),
            grams(m.fat_g)
        ),
        None => "—".to_string(),
    }
}

pub fn meals_table(meals: &[MealRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Dish", "Calories", "Macros", "Ingredients"]);

    for meal in meals {
        table.add_row(vec![
            truncate(meal.display_name(), NAME_WIDTH),
            meal.calories_label(),
            format_macros(meal.macros.as_ref()),
            truncate(&meal.ingredient_summary(), INGREDIENTS_WIDTH),
        ]);
    }

    table
}

pub fn print_meal(meal: &MealRecord) {
    println!("{}", meal.display_name().bold());
    println!("  {} {} kcal", "Calories:".cyan(), meal.calories_label());
    println!("  {} {}", "Macros:".cyan(), format_macros(meal.macros.as_ref()));
    let ingredients = meal.ingredient_summary();
    if !ingredients.is_empty() {
        println!("  {} {}", "Ingredients:".cyan(), ingredients);
    }
}

pub fn source_label(source: EndpointSource) -> &'static str {
    match source {
        EndpointSource::Override => "saved override",
        EndpointSource::Environment => "environment",
        EndpointSource::Default => "built-in default",
    }
}

pub fn print_endpoint(endpoint: &EndpointConfig) {
    println!(
        "{} {} ({})",
        "Backend:".cyan(),
        endpoint.resolved_url,
        source_label(endpoint.source)
    );
    if endpoint.insecure() {
        println!(
            "{} Endpoint uses plaintext http; traffic is not encrypted",
            "⚠".yellow()
        );
    }
}

pub fn connectivity_label(state: &ConnectivityState) -> ColoredString {
    match state {
        ConnectivityState::Unknown => "unknown".dimmed(),
        ConnectivityState::Reachable => "reachable".green().bold(),
        ConnectivityState::Unreachable { detail } => {
            format!("unreachable ({})", detail).red().bold()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Salad", 10), "Salad");
        assert_eq!(truncate("Spaghetti carbonara", 10), "Spaghet...");
        assert_eq!(truncate("crème brûlée tart", 8), "crème...");
    }

    #[test]
    fn test_format_macros() {
        let macros = Macros {
            carbs_g: Some(20.4),
            protein_g: Some(5.0),
            fat_g: Some(9.6),
        };
        assert_eq!(format_macros(Some(&macros)), "C 20g / P 5g / F 10g");
        assert_eq!(format_macros(None), "—");

        let partial = Macros {
            carbs_g: None,
            protein_g: Some(4.0),
            fat_g: None,
        };
        assert_eq!(format_macros(Some(&partial)), "C — / P 4g / F —");
    }

    #[test]
    fn test_meals_table_uses_display_fallbacks() {
        let meal = MealRecord {
            id: "m1".to_string(),
            dish_name: String::new(),
            calories: Some(249.6),
            macros: None,
            ingredients: None,
        };
        let unknown = MealRecord {
            id: "m2".to_string(),
            dish_name: "Soup".to_string(),
            calories: None,
            macros: None,
            ingredients: None,
        };

        let rendered = meals_table(&[meal, unknown]).to_string();
        assert!(rendered.contains("Meal"));
        assert!(rendered.contains("250"));
        assert!(rendered.contains("Soup"));
    }
}
