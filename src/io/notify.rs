//! Text-message delivery.
//!
//! Notifiers are collaborators: the ledger hands them finished messages and never lets a
//! delivery failure fail the operation that triggered it.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Delivers a text message to a phone number.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError>;
}

/// Sends messages by running an external program, by default `termux-sms-send -n <phone> <message>`.
///
/// The command line is split on whitespace into a program and leading arguments;
/// `-n <phone> <message>` are appended as separate arguments, so nothing passes through a shell.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub const DEFAULT_COMMAND: &'static str = "termux-sms-send";

    /// Returns `None` for a blank command line.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn arguments(&self, phone: &str, message: &str) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("-n".to_string());
        args.push(phone.to_string());
        args.push(message.to_string());
        args
    }
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self {
            program: Self::DEFAULT_COMMAND.to_string(),
            args: Vec::new(),
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        debug!(program = %self.program, phone, "sending text message");

        let output = Command::new(&self.program)
            .args(self.arguments(phone, message))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NotifyError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(phone, "text message sent");
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        info!(phone, message, "text message (not delivered, no SMS command configured)");
        Ok(())
    }
}
