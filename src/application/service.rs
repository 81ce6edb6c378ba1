use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::{
    balance_before, build_integrity_report, day_start, fold_balance, format_cents, format_money,
    Cents, Customer, CustomerId, DateRange, IntegrityReport, MenuItem, MenuItemId, Transaction,
    TransactionKind, MAX_AMOUNT_CENTS,
};
use crate::io::{LogNotifier, Notifier, TransactionSink};
use crate::storage::{BalanceUpdate, Repository};

use super::{
    AppError, CustomerInfo, DispatchReport, GlobalSummary, NotificationOutcome, RangeSummary,
    RecordedTransaction,
};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// The ledger engine: sole writer of balances and sole source of point-in-time balances.
///
/// Collaborators (the transaction sink and the notifier) receive data the engine has
/// already committed or computed; their failures are logged and never surface as errors.
pub struct LedgerService {
    repo: Repository,
    sink: Option<Arc<dyn TransactionSink>>,
    notifier: Arc<dyn Notifier>,
    currency: String,
}

impl LedgerService {
    /// Create a ledger service over the given repository. Messages go to the log until a
    /// notifier is attached.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            sink: None,
            notifier: Arc::new(LogNotifier),
            currency: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }

    /// Open (creating if missing) and migrate the database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Close the storage handle. The service must not be used afterwards.
    pub async fn close(&self) {
        self.repo.close().await;
    }

    pub fn with_sink(mut self, sink: Arc<dyn TransactionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_currency(mut self, symbol: impl Into<String>) -> Self {
        self.currency = symbol.into();
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    // ========================
    // Customer operations
    // ========================

    /// Create a customer with an empty tab. The name is stored as given, empty included.
    pub async fn create_customer(
        &self,
        name: impl Into<String>,
        phone: Option<String>,
    ) -> Result<Customer, AppError> {
        let customer = Customer::new(name, phone);
        self.repo.save_customer(&customer).await?;

        info!(customer_id = %customer.id, name = %customer.name, "customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    /// Customer plus ledger statistics.
    pub async fn get_customer_info(&self, id: CustomerId) -> Result<CustomerInfo, AppError> {
        let customer = self.get_customer(id).await?;
        let transactions = self.repo.list_transactions_for_customer(id).await?;

        Ok(CustomerInfo {
            customer,
            transaction_count: transactions.len() as i64,
            last_activity: transactions.last().map(|tx| tx.timestamp),
        })
    }

    /// All customers with their current cached balance.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers().await?)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a transaction stamped with the current time.
    ///
    /// `kind` must be exactly `"credit"` or `"debit"`. The sign applied to the balance comes
    /// from `kind`; the sign of `amount_cents` is ignored.
    pub async fn record_transaction(
        &self,
        customer_id: CustomerId,
        amount_cents: Cents,
        description: &str,
        kind: &str,
    ) -> Result<RecordedTransaction, AppError> {
        self.record_transaction_at(customer_id, amount_cents, description, kind, Utc::now())
            .await
    }

    /// Record a transaction with an explicit timestamp (back-dated entries).
    ///
    /// The ledger row and the balance update commit together or not at all. The committed
    /// transaction is then handed to the sink, whose failures are only logged.
    pub async fn record_transaction_at(
        &self,
        customer_id: CustomerId,
        amount_cents: Cents,
        description: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<RecordedTransaction, AppError> {
        let kind = kind
            .parse::<TransactionKind>()
            .map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        if amount_cents == 0 {
            return Err(AppError::InvalidArgument(
                "Amount must be non-zero".to_string(),
            ));
        }
        if amount_cents.unsigned_abs() > MAX_AMOUNT_CENTS.unsigned_abs() {
            return Err(AppError::InvalidArgument(format!(
                "Amount must not exceed {} in magnitude",
                format_cents(MAX_AMOUNT_CENTS)
            )));
        }

        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::InvalidArgument(
                "Description is required".to_string(),
            ));
        }

        let customer = self.get_customer(customer_id).await?;

        let mut transaction =
            Transaction::new(customer_id, amount_cents, kind, description, timestamp);

        let balance = match self.repo.record_transaction(&mut transaction).await? {
            BalanceUpdate::Applied(balance) => balance,
            BalanceUpdate::CustomerMissing => {
                return Err(AppError::CustomerNotFound(customer_id.to_string()));
            }
            BalanceUpdate::OutOfRange { current } => {
                return Err(AppError::BalanceOutOfRange(format!(
                    "{} {} on a balance of {} for customer {}",
                    transaction.kind,
                    format_cents(transaction.amount_cents.saturating_abs()),
                    format_cents(current),
                    customer_id
                )));
            }
        };

        info!(
            transaction_id = %transaction.id,
            customer_id = %customer_id,
            kind = %transaction.kind,
            amount = transaction.amount_cents,
            balance,
            "transaction recorded"
        );

        self.publish(&transaction).await;

        Ok(RecordedTransaction {
            transaction,
            customer_name: customer.name,
            balance,
        })
    }

    /// Hand a committed transaction to the sink. The sink runs on the blocking pool and
    /// its failures are only logged.
    async fn publish(&self, transaction: &Transaction) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let transaction_id = transaction.id;
        let transaction = transaction.clone();

        let result = tokio::task::spawn_blocking(move || sink.append(&transaction)).await;
        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{:#}", e),
            Err(e) => e.to_string(),
        };
        warn!(transaction_id = %transaction_id, error = %error, "failed to export transaction");
    }

    /// Every transaction, newest first.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions_desc().await?)
    }

    /// A customer's ledger, oldest first.
    pub async fn list_customer_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_customer(customer_id).await?;
        Ok(self.repo.list_transactions_for_customer(customer_id).await?)
    }

    // ========================
    // Balance queries
    // ========================

    /// Balance before `as_of` (exclusive): the replay of every transaction timestamped
    /// earlier than midnight UTC starting that day.
    pub async fn point_in_time_balance(
        &self,
        customer_id: CustomerId,
        as_of: NaiveDate,
    ) -> Result<Cents, AppError> {
        self.get_customer(customer_id).await?;
        let balance = self
            .repo
            .balance_before(customer_id, day_start(as_of))
            .await?;

        debug!(customer_id = %customer_id, %as_of, balance, "point-in-time balance");
        Ok(balance)
    }

    /// Opening balance, closing balance and the transactions of an inclusive date range.
    /// Both dates default to today (UTC).
    ///
    /// Opening and closing are replayed from one read of the ledger, so they stay correct
    /// no matter what was recorded after `end`.
    pub async fn range_summary(
        &self,
        customer_id: CustomerId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<RangeSummary, AppError> {
        let range = resolve_range(start_date, end_date)?;
        self.get_customer(customer_id).await?;

        let history = self
            .repo
            .list_transactions_between(Some(customer_id), None, Some(range.end_instant_exclusive()))
            .await?;

        let out_of_range = || {
            AppError::BalanceOutOfRange(format!("ledger replay for customer {}", customer_id))
        };
        let opening = balance_before(&history, range.start_instant()).ok_or_else(out_of_range)?;
        let transactions: Vec<Transaction> = history
            .into_iter()
            .filter(|tx| range.contains(tx.timestamp))
            .collect();
        let closing = fold_balance(&transactions)
            .and_then(|net| opening.checked_add(net))
            .ok_or_else(out_of_range)?;

        Ok(RangeSummary {
            customer_id,
            start_date: range.start,
            end_date: range.end,
            opening,
            closing,
            transactions,
        })
    }

    /// All customers' transactions in a date range plus the current total of all cached
    /// balances. Both dates default to today (UTC).
    pub async fn global_daily_summary(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<GlobalSummary, AppError> {
        let range = resolve_range(start_date, end_date)?;

        let transactions = self
            .repo
            .list_transactions_between(
                None,
                Some(range.start_instant()),
                Some(range.end_instant_exclusive()),
            )
            .await?;
        let total_credits_now = self.repo.total_credits().await?;

        Ok(GlobalSummary {
            start_date: range.start,
            end_date: range.end,
            transactions,
            total_credits_now,
        })
    }

    /// Sum of every customer's cached balance, right now.
    pub async fn total_credits(&self) -> Result<Cents, AppError> {
        Ok(self.repo.total_credits().await?)
    }

    /// Replay every customer's ledger and compare it with the cached balances.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let customers = self.repo.list_customers().await?;
        let transactions = self.repo.list_transactions_between(None, None, None).await?;

        let report = build_integrity_report(&customers, &transactions);
        if !report.is_healthy() {
            warn!(
                mismatches = report.mismatches.len(),
                orphaned = report.orphaned_transactions,
                "ledger integrity check failed"
            );
        }
        Ok(report)
    }

    // ========================
    // Menu operations
    // ========================

    pub async fn add_menu_item(&self, name: &str) -> Result<MenuItem, AppError> {
        let item = MenuItem::new(name).ok_or_else(|| {
            AppError::InvalidArgument("Menu item name is required".to_string())
        })?;

        if !self.repo.save_menu_item(&item).await? {
            return Err(AppError::MenuItemAlreadyExists(item.name));
        }
        Ok(item)
    }

    pub async fn list_menu_items(&self) -> Result<Vec<MenuItem>, AppError> {
        Ok(self.repo.list_menu_items().await?)
    }

    pub async fn remove_menu_item(&self, id: MenuItemId) -> Result<MenuItem, AppError> {
        let item = self
            .repo
            .get_menu_item(id)
            .await?
            .ok_or_else(|| AppError::MenuItemNotFound(id.to_string()))?;

        self.repo.delete_menu_item(id).await?;
        Ok(item)
    }

    // ========================
    // Notifications
    // ========================

    /// Text a customer today's transactions and closing balance.
    ///
    /// Unknown customers are an error; delivery problems are reported in the outcome only.
    pub async fn notify_customer_daily_report(
        &self,
        customer_id: CustomerId,
    ) -> Result<NotificationOutcome, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let summary = self.range_summary(customer_id, None, None).await?;

        let message = self.daily_report_message(&customer, &summary);
        Ok(self.deliver(&customer, &message).await)
    }

    fn daily_report_message(&self, customer: &Customer, summary: &RangeSummary) -> String {
        let mut message = format!(
            "Hello {}, your daily report for {}:\nClosing Balance: {}\nTransactions:\n",
            customer.name,
            summary.end_date,
            format_money(&self.currency, summary.closing)
        );

        if summary.transactions.is_empty() {
            message.push_str("No transactions today.");
        } else {
            let lines: Vec<String> = summary
                .transactions
                .iter()
                .map(|tx| {
                    format!(
                        "{}: {} - {}",
                        tx.kind.as_str().to_uppercase(),
                        format_money(&self.currency, tx.amount_cents.abs()),
                        tx.description
                    )
                })
                .collect();
            message.push_str(&lines.join("\n"));
        }

        message
    }

    /// Text every customer with a phone number their current balance.
    ///
    /// Messages go out concurrently; a failed delivery is counted and logged but never stops
    /// the others. Only failing to read the customer list is an error.
    pub async fn dispatch_daily_notifications(&self) -> Result<DispatchReport, AppError> {
        let customers = self.repo.list_customers().await?;
        info!(customers = customers.len(), "dispatching end-of-day balance messages");

        let deliveries = customers.iter().map(|customer| {
            let message = format!(
                "Hello {}, your cafe credit balance is {}. Thank you!",
                customer.name,
                format_money(&self.currency, customer.credit)
            );
            async move { self.deliver(customer, &message).await }
        });

        let mut report = DispatchReport::default();
        for outcome in join_all(deliveries).await {
            report.record(&outcome);
        }

        info!(
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "end-of-day dispatch finished"
        );
        Ok(report)
    }

    async fn deliver(&self, customer: &Customer, message: &str) -> NotificationOutcome {
        let Some(phone) = customer.phone.as_deref() else {
            debug!(customer_id = %customer.id, "no phone on file, skipping message");
            return NotificationOutcome::Skipped;
        };

        match self.notifier.send(phone, message).await {
            Ok(()) => NotificationOutcome::Sent,
            Err(e) => {
                warn!(customer_id = %customer.id, error = %e, "failed to deliver text message");
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Default missing bounds to today and reject inverted ranges.
fn resolve_range(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<DateRange, AppError> {
    let today = Utc::now().date_naive();
    let start = start_date.unwrap_or(today);
    let end = end_date.unwrap_or(today);

    DateRange::new(start, end).ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "Start date {} is after end date {}",
            start, end
        ))
    })
}
