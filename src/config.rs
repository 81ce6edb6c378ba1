//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or an environment variable; the CLI
//! assembles a [`Config`] and the rest of the crate only sees that.

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::{AppError, LedgerService, DEFAULT_CURRENCY_SYMBOL};
use crate::io::{CommandNotifier, CsvJournal, LogNotifier, Notifier, TransactionSink};

/// Environment variable for the log filter (`tracing_subscriber::EnvFilter` syntax).
pub const LOG_ENV_VAR: &str = "CAFE_LEDGER_LOG";
/// Environment variable for the database file path.
pub const DATABASE_ENV_VAR: &str = "CAFE_LEDGER_DB";
/// Environment variable for the directory holding daily transaction journals.
pub const EXPORT_DIR_ENV_VAR: &str = "CAFE_LEDGER_EXPORT_DIR";
/// Environment variable for the SMS command line.
pub const SMS_COMMAND_ENV_VAR: &str = "CAFE_LEDGER_SMS_COMMAND";
/// Environment variable for the currency symbol used in messages.
pub const CURRENCY_ENV_VAR: &str = "CAFE_LEDGER_CURRENCY";
/// Environment variable for the daily dispatch time (UTC, HH:MM).
pub const DISPATCH_AT_ENV_VAR: &str = "CAFE_LEDGER_DISPATCH_AT";

pub const DEFAULT_DATABASE: &str = "cafe.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: PathBuf,
    pub export_dir: PathBuf,
    /// Write the daily CSV journal on every recorded transaction.
    pub journal_enabled: bool,
    /// Program (plus leading arguments) used to send text messages. `None` logs them instead.
    pub sms_command: Option<String>,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            export_dir: PathBuf::from("."),
            journal_enabled: true,
            sms_command: None,
            currency: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> String {
        self.database.to_string_lossy().into_owned()
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match self
            .sms_command
            .as_deref()
            .and_then(CommandNotifier::from_command_line)
        {
            Some(command) => Arc::new(command),
            None => Arc::new(LogNotifier),
        }
    }

    pub fn sink(&self) -> Option<Arc<dyn TransactionSink>> {
        self.journal_enabled
            .then(|| Arc::new(CsvJournal::new(&self.export_dir)) as Arc<dyn TransactionSink>)
    }

    fn wire(&self, service: LedgerService) -> LedgerService {
        let service = service
            .with_notifier(self.notifier())
            .with_currency(self.currency.clone());
        match self.sink() {
            Some(sink) => service.with_sink(sink),
            None => service,
        }
    }

    /// Create (if needed) and migrate the database, then attach collaborators.
    pub async fn init_service(&self) -> Result<LedgerService, AppError> {
        Ok(self.wire(LedgerService::init(&self.database_path()).await?))
    }

    /// Open an existing database and attach collaborators.
    pub async fn open_service(&self) -> Result<LedgerService, AppError> {
        Ok(self.wire(LedgerService::connect(&self.database_path()).await?))
    }
}
