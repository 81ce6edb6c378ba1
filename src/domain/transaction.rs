use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Cents, CustomerId};

pub type TransactionId = Uuid;

/// Whether a transaction raises or lowers the customer's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    /// Apply this kind's sign to a magnitude. The literal sign of `amount` is ignored.
    pub fn apply(&self, amount: Cents) -> Cents {
        let magnitude = amount.saturating_abs();
        match self {
            TransactionKind::Credit => magnitude,
            TransactionKind::Debit => -magnitude,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transaction type '{0}': expected 'credit' or 'debit'")]
pub struct InvalidKind(pub String);

impl FromStr for TransactionKind {
    type Err = InvalidKind;

    /// Exact match only: "Credit" or " debit" are rejected like any other unknown value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(InvalidKind(other.to_string())),
        }
    }
}

/// One immutable entry in a customer's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing across the whole ledger; breaks timestamp ties.
    pub sequence: i64,
    pub customer_id: CustomerId,
    /// The amount exactly as entered, sign included.
    pub amount_cents: Cents,
    pub kind: TransactionKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction. The sequence number is assigned by the repository.
    /// Timestamps keep microsecond precision, the resolution they are stored at.
    pub fn new(
        customer_id: CustomerId,
        amount_cents: Cents,
        kind: TransactionKind,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            customer_id,
            amount_cents,
            kind,
            description: description.into(),
            timestamp: timestamp.trunc_subsecs(6),
        }
    }

    /// Effect of this transaction on the balance: `+|amount|` for credits, `-|amount|` for debits.
    pub fn signed_amount(&self) -> Cents {
        self.kind.apply(self.amount_cents)
    }
}
