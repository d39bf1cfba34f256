//! Service liveness check.

use nutriscan_client::NutriScanClient;

use super::{CliError, say};

/// # Errors
///
/// Returns an error if the service is unreachable and nothing was cached.
pub async fn check(client: &NutriScanClient) -> Result<(), CliError> {
    let health = client.api().health().await?;
    let version = health.version.as_deref().unwrap_or("unknown");
    if health.is_ok() {
        say(&format!("Service is up (version {version})"));
    } else {
        say(&format!("Service reports '{}' (version {version})", health.status));
    }
    Ok(())
}
