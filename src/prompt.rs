//! Interactive confirmation.

use crate::error::RunError;
use async_trait::async_trait;
use dialoguer::Confirm;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question. An error means no answer could be obtained.
    async fn confirm(&self, message: &str) -> Result<bool, RunError>;
}

/// Asks on the controlling terminal. Fails when stdin is not interactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str) -> Result<bool, RunError> {
        let prompt = message.to_string();
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
                .map_err(|e| RunError::Configuration(format!("Failed to get user input: {}", e)))
        })
        .await
        .map_err(|e| RunError::Configuration(format!("Failed to get user input: {}", e)))?
    }
}
