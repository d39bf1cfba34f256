//! Subcommand implementations.

pub mod account;
pub mod health;
pub mod meals;
pub mod subscription;

use std::io::Write;

use nutriscan_client::{ClientError, ConfigError, StorageError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),

    /// Arguments that parse but make no sense together.
    #[error("{0}")]
    Usage(String),
}

/// Command output.
#[allow(clippy::print_stdout)]
pub fn say(text: &str) {
    println!("{text}");
}

/// Status messages that are not command output.
#[allow(clippy::print_stderr)]
pub fn notice(text: &str) {
    eprintln!("{text}");
}

/// Ask for one line on stdin. Returns `None` at end of input.
pub async fn prompt(label: &str) -> Result<Option<String>, std::io::Error> {
    {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(label.as_bytes())?;
        stderr.flush()?;
    }

    // std's stdin buffer is process-wide, so consecutive prompts never lose
    // piped lines.
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>((read > 0).then_some(line))
    })
    .await
    .map_err(std::io::Error::other)??;

    Ok(line.map(|line| line.trim().to_string()))
}

/// Use `given`, or prompt for a password.
pub async fn password(given: Option<String>) -> Result<String, CliError> {
    if let Some(password) = given.filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    match prompt("Password: ").await? {
        Some(password) if !password.is_empty() => Ok(password),
        _ => Err(CliError::Usage("a password is required".to_string())),
    }
}
