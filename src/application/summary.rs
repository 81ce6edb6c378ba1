use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, Customer, CustomerId, Transaction};

/// A customer's ledger over an inclusive date range.
///
/// `opening` is replayed from every transaction before `start_date`; `closing` is
/// `opening` plus the signed transactions in the range. Neither is read from the
/// customer's cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub customer_id: CustomerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub opening: Cents,
    pub closing: Cents,
    pub transactions: Vec<Transaction>,
}

impl RangeSummary {
    pub fn net_change(&self) -> Option<Cents> {
        self.closing.checked_sub(self.opening)
    }
}

/// Every customer's transactions in a date range, alongside the present-moment total of
/// all cached balances. The total is not range-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub transactions: Vec<Transaction>,
    pub total_credits_now: Cents,
}

/// Result of recording a transaction.
#[derive(Debug, Clone)]
pub struct RecordedTransaction {
    pub transaction: Transaction,
    pub customer_name: String,
    /// Cached balance immediately after this transaction committed.
    pub balance: Cents,
}

/// Customer plus ledger statistics for detail views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub customer: Customer,
    pub transaction_count: i64,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

/// What happened to a single text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum NotificationOutcome {
    Sent,
    /// The customer has no phone number on file.
    Skipped,
    Failed(String),
}

/// Tally of one run of the end-of-day balance messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn record(&mut self, outcome: &NotificationOutcome) {
        match outcome {
            NotificationOutcome::Sent => self.sent += 1,
            NotificationOutcome::Skipped => self.skipped += 1,
            NotificationOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sent + self.skipped + self.failed
    }
}
