use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::domain::{format_cents, Transaction};

/// Column layout shared by the daily journal and full exports.
pub const TRANSACTION_HEADER: [&str; 7] = [
    "id",
    "sequence",
    "customer_id",
    "amount",
    "description",
    "type",
    "timestamp",
];

/// Receives every committed transaction. Sinks sit outside the ledger's trust boundary:
/// the ledger logs their failures and carries on.
pub trait TransactionSink: Send + Sync {
    fn append(&self, transaction: &Transaction) -> Result<()>;
}

fn transaction_record(transaction: &Transaction) -> [String; 7] {
    [
        transaction.id.to_string(),
        transaction.sequence.to_string(),
        transaction.customer_id.to_string(),
        format_cents(transaction.amount_cents),
        transaction.description.clone(),
        transaction.kind.as_str().to_string(),
        transaction.timestamp.to_rfc3339(),
    ]
}

/// Append-only audit trail: one CSV file per calendar day, header on the first line.
///
/// Files are named `transactions_YYYY-MM-DD.csv` after the transaction's UTC date.
/// The ledger never reads them back.
pub struct CsvJournal {
    dir: PathBuf,
    // Serializes appends so concurrent writers never interleave half lines.
    lock: Mutex<()>,
}

impl CsvJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("transactions_{}.csv", date.format("%Y-%m-%d")))
    }
}

impl TransactionSink for CsvJournal {
    fn append(&self, transaction: &Transaction) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("Journal lock poisoned"))?;

        let path = self.path_for(transaction.timestamp.date_naive());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;
        let is_new = file
            .metadata()
            .with_context(|| format!("Failed to stat journal {}", path.display()))?
            .len()
            == 0;

        let mut csv_writer = csv::Writer::from_writer(file);
        if is_new {
            csv_writer.write_record(TRANSACTION_HEADER)?;
        }
        csv_writer.write_record(transaction_record(transaction))?;
        csv_writer.flush()?;
        Ok(())
    }
}

/// Export transactions to CSV in the journal's column layout.
pub fn export_transactions_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(TRANSACTION_HEADER)?;

    for transaction in transactions {
        csv_writer.write_record(transaction_record(transaction))?;
    }

    csv_writer.flush()?;
    Ok(transactions.len())
}
