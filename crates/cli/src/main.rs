//! NutriScan CLI - Log meals and track nutrition from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Create an account (password from NUTRISCAN_PASSWORD or a prompt)
//! nutriscan register -e asha@example.com -n Asha
//!
//! # Analyze a meal photo
//! nutriscan analyze thali.jpg --meal-type lunch
//!
//! # Show today, the last 7 days and lifetime stats
//! nutriscan dashboard --days 7
//! ```
//!
//! # Commands
//!
//! - `register` / `login` / `logout` - Session management
//! - `profile show|update` - Read or change the profile
//! - `status` / `subscribe` / `verify` / `history` - Subscription
//! - `analyze` / `dashboard` / `meals` / `delete` - Meal logging
//! - `health` - Service liveness (answered from cache when offline)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nutriscan_client::{ClientConfig, DEFAULT_HISTORY_DAYS, NutriScanClient, SessionEvent};
use nutriscan_core::{DayNumber, MealId, MealType};
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod checkout;
mod commands;
mod render;

use commands::CliError;

#[derive(Parser)]
#[command(name = "nutriscan")]
#[command(author, version, about = "NutriScan meal analysis from the terminal")]
struct Cli {
    /// Override the service base URL
    #[arg(long, global = true)]
    api_url: Option<url::Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register(commands::account::RegisterArgs),
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        /// Password (prompted for when omitted)
        #[arg(long, env = "NUTRISCAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show or update the profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show the subscription status
    Status,
    /// Buy a subscription
    Subscribe,
    /// Verify a payment completed outside this terminal
    Verify {
        #[arg(long)]
        order_id: String,

        #[arg(long)]
        payment_id: String,

        #[arg(long)]
        signature: String,
    },
    /// Analyze a meal photo
    Analyze {
        /// Path to the photo
        photo: PathBuf,

        /// Meal slot (`breakfast`, `lunch`, `dinner`, `snack`)
        #[arg(short, long, default_value = "lunch")]
        meal_type: MealType,
    },
    /// Show today, recent history and lifetime stats
    Dashboard {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },
    /// List logged meals
    Meals {
        /// Only meals from this program day
        #[arg(long)]
        day: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,
    },
    /// Delete a logged meal and show the refreshed dashboard
    Delete {
        id: MealId,

        #[arg(short, long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },
    /// Show past subscription payments
    History,
    /// Check that the service is up
    Health,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the profile
    Show,
    /// Change profile fields
    Update(commands::account::ProfileUpdateArgs),
}

impl Commands {
    /// Commands that make sense without a session.
    const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Register(_) | Self::Login { .. } | Self::Health)
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            commands::notice(&format!("Configuration error: {e}"));
            return ExitCode::from(2);
        }
    };
    if let Some(api_url) = cli.api_url.clone() {
        config.api_url = api_url;
    }

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays pipeable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nutriscan_client=info,nutriscan_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // The Sentry guard has to drop before the process exits.
    exit_code(&run(cli, config).await)
}

fn exit_code(result: &Result<(), CliError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            commands::notice(&format!("Error: {e}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let client = NutriScanClient::connect(config).await?;
    let mut events = client.session().subscribe();

    if !cli.command.is_anonymous() {
        commands::account::show_login_hint(&client)?;
    }

    let result = dispatch(&client, cli.command).await;
    report_session_events(&mut events);
    result
}

async fn dispatch(client: &NutriScanClient, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Register(args) => commands::account::register(client, args).await,
        Commands::Login { email, password } => {
            commands::account::login(client, &email, password).await
        }
        Commands::Logout => commands::account::logout(client),
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::account::show_profile(client).await,
            ProfileAction::Update(args) => commands::account::update_profile(client, args).await,
        },
        Commands::Status => commands::subscription::status(client).await,
        Commands::Subscribe => commands::subscription::subscribe(client).await,
        Commands::Verify {
            order_id,
            payment_id,
            signature,
        } => commands::subscription::verify(client, order_id, payment_id, signature).await,
        Commands::History => commands::subscription::history(client).await,
        Commands::Analyze { photo, meal_type } => {
            commands::meals::analyze(client, &photo, meal_type).await
        }
        Commands::Dashboard { days } => commands::meals::dashboard(client, days).await,
        Commands::Meals { day, limit, offset } => {
            commands::meals::list(client, day.map(DayNumber::new), limit, offset).await
        }
        Commands::Delete { id, days } => commands::meals::delete(client, id, days).await,
        Commands::Health => commands::health::check(client).await,
    }
}

/// Tell the user when the server ended the session during the command.
fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::Invalidated {
            tracing::warn!("Session invalidated by the server");
            commands::notice("Your session has ended. Run `nutriscan login` to sign in again.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["nutriscan", "analyze", "thali.jpg", "-m", "dinner"])
            .expect("parse");
        match cli.command {
            Commands::Analyze { photo, meal_type } => {
                assert_eq!(photo, PathBuf::from("thali.jpg"));
                assert_eq!(meal_type, MealType::Dinner);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_parse_delete_defaults() {
        let cli = Cli::try_parse_from(["nutriscan", "delete", "42"]).expect("parse");
        match cli.command {
            Commands::Delete { id, days } => {
                assert_eq!(id, MealId::new(42));
                assert_eq!(days, 7);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_dashboard_defaults_to_a_week() {
        let cli = Cli::try_parse_from(["nutriscan", "dashboard"]).expect("parse");
        match cli.command {
            Commands::Dashboard { days } => assert_eq!(days, 7),
            _ => panic!("expected dashboard"),
        }
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&Ok(())), ExitCode::SUCCESS);
        let failed = exit_code(&Err(CliError::Usage("no photo".to_string())));
        assert_eq!(failed, ExitCode::FAILURE);
    }

    #[test]
    fn test_anonymous_commands() {
        let health = Cli::try_parse_from(["nutriscan", "health"]).expect("parse");
        assert!(health.command.is_anonymous());
        let status = Cli::try_parse_from(["nutriscan", "status"]).expect("parse");
        assert!(!status.command.is_anonymous());
    }
}
