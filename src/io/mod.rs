pub mod export;
pub mod notify;

pub use export::{export_transactions_csv, CsvJournal, TransactionSink};
pub use notify::{CommandNotifier, LogNotifier, Notifier, NotifyError};
