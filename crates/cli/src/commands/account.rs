//! Account and profile commands.
//!
//! # Usage
//!
//! ```bash
//! nutriscan register -e asha@example.com -n Asha --age 31 --condition pcos
//! nutriscan login -e asha@example.com
//! nutriscan profile update --weight-kg 64.5 --calorie-target 1800
//! nutriscan logout
//! ```

use clap::Args;
use nutriscan_client::NutriScanClient;
use nutriscan_core::{ProfileUpdate, RegisterRequest};
use tracing::info;

use super::{CliError, notice, password, say};
use crate::render;

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(short, long)]
    email: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// Password (prompted for when omitted)
    #[arg(long, env = "NUTRISCAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    weight_kg: Option<f64>,

    #[arg(long)]
    height_cm: Option<f64>,

    /// e.g. `sedentary`, `moderate`, `active`
    #[arg(long)]
    activity_level: Option<String>,

    /// e.g. `weight_loss`, `maintenance`, `muscle_gain`
    #[arg(long)]
    health_goal: Option<String>,

    #[arg(long)]
    dietary_preference: Option<String>,

    /// Health condition (repeatable)
    #[arg(long = "condition")]
    conditions: Vec<String>,

    /// Daily calorie target
    #[arg(long)]
    calorie_target: Option<u32>,
}

#[derive(Args)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    weight_kg: Option<f64>,

    #[arg(long)]
    height_cm: Option<f64>,

    #[arg(long)]
    activity_level: Option<String>,

    #[arg(long)]
    health_goal: Option<String>,

    #[arg(long)]
    dietary_preference: Option<String>,

    /// Replace the health conditions (repeatable)
    #[arg(long = "condition")]
    conditions: Option<Vec<String>>,

    #[arg(long)]
    calorie_target: Option<u32>,
}

impl From<ProfileUpdateArgs> for ProfileUpdate {
    fn from(args: ProfileUpdateArgs) -> Self {
        Self {
            name: args.name,
            age: args.age,
            gender: args.gender,
            weight_kg: args.weight_kg,
            height_cm: args.height_cm,
            activity_level: args.activity_level,
            health_goal: args.health_goal,
            dietary_preference: args.dietary_preference,
            health_conditions: args.conditions,
            daily_calorie_target: args.calorie_target,
        }
    }
}

/// Create an account and sign in.
///
/// # Errors
///
/// Returns an error if the password cannot be read or registration fails.
pub async fn register(client: &NutriScanClient, args: RegisterArgs) -> Result<(), CliError> {
    let request = RegisterRequest {
        password: password(args.password).await?,
        email: args.email,
        name: args.name,
        age: args.age,
        gender: args.gender,
        weight_kg: args.weight_kg,
        height_cm: args.height_cm,
        activity_level: args.activity_level,
        health_goal: args.health_goal,
        dietary_preference: args.dietary_preference,
        health_conditions: args.conditions,
        daily_calorie_target: args.calorie_target,
    };

    let response = client.api().register(&request).await?;
    say(response
        .message
        .as_deref()
        .unwrap_or("Registration successful"));
    Ok(())
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns an error if the credentials are rejected.
pub async fn login(
    client: &NutriScanClient,
    email: &str,
    given_password: Option<String>,
) -> Result<(), CliError> {
    let password = password(given_password).await?;
    let response = client.api().login(email, &password).await?;
    match response.name {
        Some(name) => say(&format!("Logged in as {name}")),
        None => say("Logged in"),
    }
    Ok(())
}

/// Forget the stored session.
///
/// # Errors
///
/// Returns an error if the stored credential cannot be removed.
pub fn logout(client: &NutriScanClient) -> Result<(), CliError> {
    client.api().logout()?;
    say("Logged out");
    Ok(())
}

/// # Errors
///
/// Returns an error if the profile cannot be fetched.
pub async fn show_profile(client: &NutriScanClient) -> Result<(), CliError> {
    let profile = client.api().profile().await?;
    say(&render::profile(&profile));
    Ok(())
}

/// # Errors
///
/// Returns an error if no field was given or the update is rejected.
pub async fn update_profile(
    client: &NutriScanClient,
    args: ProfileUpdateArgs,
) -> Result<(), CliError> {
    let update = ProfileUpdate::from(args);
    if update.is_empty() {
        return Err(CliError::Usage(
            "nothing to update; pass at least one field".to_string(),
        ));
    }
    let response = client.api().update_profile(&update).await?;
    say(&response.message);
    Ok(())
}

/// One-time hint for users who have never signed in.
///
/// # Errors
///
/// Returns an error if the dismissal cannot be persisted.
pub fn show_login_hint(client: &NutriScanClient) -> Result<(), CliError> {
    let session = client.session();
    if session.is_signed_in() || session.install_prompt_dismissed()? {
        return Ok(());
    }
    notice("Tip: run `nutriscan register` to create an account, or `nutriscan login` to sign in.");
    session.dismiss_install_prompt()?;
    info!("Login hint shown");
    Ok(())
}
