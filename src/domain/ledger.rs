use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Customer, CustomerId, Transaction};

/// Midnight UTC at the start of `date`.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// An inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// First instant inside the range.
    pub fn start_instant(&self) -> DateTime<Utc> {
        day_start(self.start)
    }

    /// First instant after the range (midnight of the day after `end`).
    pub fn end_instant_exclusive(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .map(day_start)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// True when the timestamp's UTC date falls within `start..=end`.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        self.start <= date && date <= self.end
    }
}

/// Replay a ledger: the sum of every transaction's signed amount.
/// `None` when the running balance leaves the range of `Cents`.
pub fn fold_balance<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Option<Cents> {
    transactions
        .into_iter()
        .try_fold(0 as Cents, |balance, tx| balance.checked_add(tx.signed_amount()))
}

/// Balance immediately before `boundary`: only transactions strictly earlier are replayed.
pub fn balance_before(transactions: &[Transaction], boundary: DateTime<Utc>) -> Option<Cents> {
    fold_balance(transactions.iter().filter(|tx| tx.timestamp < boundary))
}

/// A customer whose cached `credit` no longer equals the replay of their ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub cached: Cents,
    /// `None` when the replay overflows.
    pub replayed: Option<Cents>,
}

impl BalanceMismatch {
    pub fn difference(&self) -> Option<Cents> {
        self.replayed
            .and_then(|replayed| self.cached.checked_sub(replayed))
    }
}

/// Compare every customer's cached balance with the fold of their transactions.
pub fn reconcile(customers: &[Customer], transactions: &[Transaction]) -> Vec<BalanceMismatch> {
    let mut replayed: HashMap<CustomerId, Option<Cents>> = HashMap::new();
    for tx in transactions {
        let balance = replayed.entry(tx.customer_id).or_insert(Some(0));
        *balance = balance.and_then(|b| b.checked_add(tx.signed_amount()));
    }

    customers
        .iter()
        .filter_map(|customer| {
            let replayed = replayed.get(&customer.id).copied().unwrap_or(Some(0));
            (replayed != Some(customer.credit)).then(|| BalanceMismatch {
                customer_id: customer.id,
                customer_name: customer.name.clone(),
                cached: customer.credit,
                replayed,
            })
        })
        .collect()
}

/// Integrity report for the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub customer_count: usize,
    pub transaction_count: usize,
    pub mismatches: Vec<BalanceMismatch>,
    /// Transactions whose customer row does not exist.
    pub orphaned_transactions: usize,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.mismatches.is_empty() && self.orphaned_transactions == 0
    }
}

pub fn build_integrity_report(
    customers: &[Customer],
    transactions: &[Transaction],
) -> IntegrityReport {
    let orphaned_transactions = transactions
        .iter()
        .filter(|tx| !customers.iter().any(|c| c.id == tx.customer_id))
        .count();

    IntegrityReport {
        customer_count: customers.len(),
        transaction_count: transactions.len(),
        mismatches: reconcile(customers, transactions),
        orphaned_transactions,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::TransactionKind;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(customer: CustomerId, amount: Cents, kind: TransactionKind, when: DateTime<Utc>) -> Transaction {
        Transaction::new(customer, amount, kind, "item", when)
    }

    #[test]
    fn test_fold_empty_ledger() {
        assert_eq!(fold_balance(&[] as &[Transaction]), Some(0));
    }

    #[test]
    fn test_fold_applies_kind_signs() {
        let c = uuid::Uuid::new_v4();
        let ledger = vec![
            tx(c, 10000, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(c, 3000, TransactionKind::Debit, at(2024, 3, 1, 10)),
            tx(c, -500, TransactionKind::Debit, at(2024, 3, 2, 10)),
        ];
        assert_eq!(fold_balance(&ledger), Some(6500));
    }

    #[test]
    fn test_fold_reports_overflow() {
        let c = uuid::Uuid::new_v4();
        let ledger = vec![
            tx(c, i64::MAX, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(c, 1, TransactionKind::Credit, at(2024, 3, 1, 10)),
        ];
        assert_eq!(fold_balance(&ledger), None);
        assert_eq!(fold_balance(&ledger[..1]), Some(i64::MAX));
    }

    #[test]
    fn test_balance_before_is_exclusive() {
        let c = uuid::Uuid::new_v4();
        let ledger = vec![
            tx(c, 10000, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(c, 2000, TransactionKind::Debit, at(2024, 3, 2, 0)),
            tx(c, 1000, TransactionKind::Debit, at(2024, 3, 3, 12)),
        ];

        assert_eq!(balance_before(&ledger, day_start(date(2024, 3, 1))), Some(0));
        assert_eq!(balance_before(&ledger, day_start(date(2024, 3, 2))), Some(10000));
        assert_eq!(balance_before(&ledger, day_start(date(2024, 3, 3))), Some(8000));
        assert_eq!(balance_before(&ledger, day_start(date(2024, 3, 4))), Some(7000));
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 2)).unwrap();

        assert!(range.contains(at(2024, 3, 1, 0)));
        assert!(range.contains(at(2024, 3, 2, 23)));
        assert!(!range.contains(at(2024, 3, 3, 0)));
        assert!(!range.contains(at(2024, 2, 29, 23)));
        assert_eq!(range.start_instant(), at(2024, 3, 1, 0));
        assert_eq!(range.end_instant_exclusive(), at(2024, 3, 3, 0));
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        assert!(DateRange::new(date(2024, 3, 2), date(2024, 3, 1)).is_none());
        assert!(DateRange::new(date(2024, 3, 2), date(2024, 3, 2)).is_some());
    }

    #[test]
    fn test_reconcile_detects_divergent_cache() {
        let mut healthy = Customer::new("Asha", None);
        let mut drifted = Customer::new("Ravi", None);
        let untouched = Customer::new("Meera", None);

        let ledger = vec![
            tx(healthy.id, 5000, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(drifted.id, 5000, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(drifted.id, 1000, TransactionKind::Debit, at(2024, 3, 1, 10)),
        ];
        healthy.credit = 5000;
        drifted.credit = 5000;

        let mismatches = reconcile(&[healthy, drifted.clone(), untouched], &ledger);

        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].customer_id, drifted.id);
        assert_eq!(mismatches[0].replayed, Some(4000));
        assert_eq!(mismatches[0].difference(), Some(1000));
    }

    #[test]
    fn test_reconcile_flags_overflowing_replay() {
        let mut customer = Customer::new("Asha", None);
        customer.credit = i64::MAX;
        let ledger = vec![
            tx(customer.id, i64::MAX, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(customer.id, 10, TransactionKind::Credit, at(2024, 3, 1, 10)),
        ];

        let mismatches = reconcile(&[customer], &ledger);

        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].replayed, None);
        assert_eq!(mismatches[0].difference(), None);
    }

    #[test]
    fn test_integrity_report_counts_orphans() {
        let mut customer = Customer::new("Asha", None);
        customer.credit = 1000;
        let ledger = vec![
            tx(customer.id, 1000, TransactionKind::Credit, at(2024, 3, 1, 9)),
            tx(uuid::Uuid::new_v4(), 700, TransactionKind::Credit, at(2024, 3, 1, 9)),
        ];

        let report = build_integrity_report(&[customer], &ledger);

        assert_eq!(report.customer_count, 1);
        assert_eq!(report.transaction_count, 2);
        assert_eq!(report.orphaned_transactions, 1);
        assert!(report.mismatches.is_empty());
        assert!(!report.is_healthy());
    }
}
