//! Meal logging and dashboard commands.

use std::path::Path;

use nutriscan_client::{Attempt, MealPhoto, MealQuery, NutriScanClient};
use nutriscan_core::{DayNumber, MealId, MealType};

use super::{CliError, say};
use crate::checkout::TerminalCheckout;
use crate::render;

/// Analyze a photo, offering checkout if the trial is used up.
///
/// # Errors
///
/// Returns an error if the photo cannot be read or the analysis fails.
pub async fn analyze(
    client: &NutriScanClient,
    photo: &Path,
    meal_type: MealType,
) -> Result<(), CliError> {
    let photo = MealPhoto::from_path(photo).await?;
    let attempt = client
        .api()
        .analyze_meal_gated(client.gate(), &TerminalCheckout, &photo, meal_type)
        .await?;

    match attempt {
        Attempt::Completed(result) => say(&render::analysis(&result)),
        Attempt::Blocked => say(
            "Your free scans are used up. Run `nutriscan subscribe` to keep analyzing meals.",
        ),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if any of the dashboard views fails.
pub async fn dashboard(client: &NutriScanClient, days: u32) -> Result<(), CliError> {
    let dashboard = client.api().dashboard(days).await?;
    say(&render::dashboard(&dashboard));
    Ok(())
}

/// # Errors
///
/// Returns an error if the listing fails.
pub async fn list(
    client: &NutriScanClient,
    day: Option<DayNumber>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> Result<(), CliError> {
    let meals = client
        .api()
        .meals(MealQuery { day, limit, offset })
        .await?;
    say(&render::meals(&meals.meals));
    Ok(())
}

/// # Errors
///
/// Returns an error if the meal does not exist or the refresh fails.
pub async fn delete(client: &NutriScanClient, id: MealId, days: u32) -> Result<(), CliError> {
    let dashboard = client.api().delete_meal_and_refresh(id, days).await?;
    say(&format!("Deleted meal {id}\n"));
    say(&render::dashboard(&dashboard));
    Ok(())
}
