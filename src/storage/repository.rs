use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Cents, Customer, CustomerId, MenuItem, MenuItemId, Transaction, TransactionKind,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_MENU_ITEMS};

const TRANSACTION_COLUMNS: &str =
    "id, sequence, customer_id, amount_cents, type, description, timestamp";

/// How long a writer waits for SQLite's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timestamps are stored fixed-width so lexical order is chronological order.
fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp: {}", value))?
        .with_timezone(&Utc))
}

/// Outcome of [`Repository::record_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceUpdate {
    /// Committed. Carries the customer's new cached balance.
    Applied(Cents),
    CustomerMissing,
    /// The new balance would not fit in `Cents`.
    OutOfRange { current: Cents },
}

/// Repository for persisting and querying customers, transactions and menu items.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL (e.g. `sqlite:cafe.db` or `sqlite:cafe.db?mode=rwc`).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_MENU_ITEMS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Customer operations
    // ========================

    /// Save a new customer.
    pub async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, credit, created_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.credit)
        .bind(customer.created_date.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, phone, credit, created_date
            FROM customers
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    /// List all customers in creation order.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, name, phone, credit, created_date FROM customers ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Sum of every customer's cached balance, right now.
    pub async fn total_credits(&self) -> Result<Cents> {
        let row = sqlx::query("SELECT COALESCE(SUM(credit), 0) AS total FROM customers")
            .fetch_one(&self.pool)
            .await
            .context("Failed to sum customer credits")?;

        Ok(row.try_get("total")?)
    }

    fn row_to_customer(row: &SqliteRow) -> Result<Customer> {
        let id_str: String = row.try_get("id")?;
        let created_date_str: String = row.try_get("created_date")?;

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            credit: row.try_get("credit")?,
            created_date: NaiveDate::parse_from_str(&created_date_str, "%Y-%m-%d")
                .context("Invalid created_date")?,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Append a transaction and apply its signed amount to the owner's cached balance
    /// as one database transaction.
    ///
    /// Assigns `transaction.sequence` when the update is applied. On any other outcome,
    /// and on any error, nothing is written.
    pub async fn record_transaction(&self, transaction: &mut Transaction) -> Result<BalanceUpdate> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // The counter update is the first statement so the write lock is taken before the
        // balance is read.
        let sequence = Self::next_sequence(&mut *db_tx).await?;

        let current: Option<Cents> = sqlx::query("SELECT credit FROM customers WHERE id = ?")
            .bind(transaction.customer_id.to_string())
            .fetch_optional(&mut *db_tx)
            .await
            .context("Failed to read customer balance")?
            .map(|row| row.try_get("credit"))
            .transpose()
            .context("Invalid customer balance")?;

        let Some(current) = current else {
            db_tx
                .rollback()
                .await
                .context("Failed to roll back transaction")?;
            return Ok(BalanceUpdate::CustomerMissing);
        };

        let Some(balance) = current.checked_add(transaction.signed_amount()) else {
            db_tx
                .rollback()
                .await
                .context("Failed to roll back transaction")?;
            return Ok(BalanceUpdate::OutOfRange { current });
        };

        sqlx::query("UPDATE customers SET credit = ? WHERE id = ?")
            .bind(balance)
            .bind(transaction.customer_id.to_string())
            .execute(&mut *db_tx)
            .await
            .context("Failed to update customer balance")?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, customer_id, amount_cents, type, description, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(sequence)
        .bind(transaction.customer_id.to_string())
        .bind(transaction.amount_cents)
        .bind(transaction.kind.as_str())
        .bind(&transaction.description)
        .bind(encode_timestamp(transaction.timestamp))
        .execute(&mut *db_tx)
        .await
        .context("Failed to save transaction")?;

        db_tx
            .commit()
            .await
            .context("Failed to commit transaction")?;

        transaction.sequence = sequence;
        debug!(id = %transaction.id, sequence, balance, "transaction committed");
        Ok(BalanceUpdate::Applied(balance))
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.try_get("value")?)
    }

    /// List every transaction, newest first.
    pub async fn list_transactions_desc(&self) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions ORDER BY timestamp DESC, sequence DESC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// List a customer's transactions in ledger order.
    pub async fn list_transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>> {
        self.list_transactions_between(Some(customer_id), None, None)
            .await
    }

    /// List transactions in ledger order, optionally restricted to one customer and to
    /// `from <= timestamp < until`.
    pub async fn list_transactions_between(
        &self,
        customer_id: Option<CustomerId>,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>> {
        let mut query = format!("SELECT {} FROM transactions WHERE 1=1", TRANSACTION_COLUMNS);

        let customer_id_str = customer_id.map(|id| id.to_string());
        let from_str = from.map(encode_timestamp);
        let until_str = until.map(encode_timestamp);

        if customer_id_str.is_some() {
            query.push_str(" AND customer_id = ?");
        }
        if from_str.is_some() {
            query.push_str(" AND timestamp >= ?");
        }
        if until_str.is_some() {
            query.push_str(" AND timestamp < ?");
        }
        query.push_str(" ORDER BY timestamp, sequence");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = customer_id_str {
            sql_query = sql_query.bind(id);
        }
        if let Some(ref from) = from_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref until) = until_str {
            sql_query = sql_query.bind(until);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions in range")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Replay a customer's ledger up to, but excluding, `boundary`.
    ///
    /// The sign comes from the stored type; the magnitude is the absolute stored amount.
    pub async fn balance_before(
        &self,
        customer_id: CustomerId,
        boundary: DateTime<Utc>,
    ) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(
                CASE type
                    WHEN 'credit' THEN ABS(amount_cents)
                    WHEN 'debit' THEN -ABS(amount_cents)
                    ELSE 0
                END
            ), 0) AS balance
            FROM transactions
            WHERE customer_id = ? AND timestamp < ?
            "#,
        )
        .bind(customer_id.to_string())
        .bind(encode_timestamp(boundary))
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute point-in-time balance")?;

        Ok(row.try_get("balance")?)
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let id_str: String = row.try_get("id")?;
        let customer_id_str: String = row.try_get("customer_id")?;
        let kind_str: String = row.try_get("type")?;
        let timestamp_str: String = row.try_get("timestamp")?;

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.try_get("sequence")?,
            customer_id: Uuid::parse_str(&customer_id_str).context("Invalid customer ID")?,
            amount_cents: row.try_get("amount_cents")?,
            kind: TransactionKind::from_str(&kind_str)
                .with_context(|| format!("Invalid transaction type: {}", kind_str))?,
            description: row.try_get("description")?,
            timestamp: decode_timestamp(&timestamp_str)?,
        })
    }

    // ========================
    // Menu operations
    // ========================

    /// Save a new menu item. Returns `false`, writing nothing, when an item with the same
    /// name (ignoring case) already exists.
    pub async fn save_menu_item(&self, item: &MenuItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(item.id.to_string())
        .bind(&item.name)
        .bind(encode_timestamp(item.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save menu item")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a menu item by ID.
    pub async fn get_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>> {
        let row = sqlx::query("SELECT id, name, created_at FROM menu_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch menu item")?;

        row.as_ref().map(Self::row_to_menu_item).transpose()
    }

    /// List all menu items by name.
    pub async fn list_menu_items(&self) -> Result<Vec<MenuItem>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM menu_items ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list menu items")?;

        rows.iter().map(Self::row_to_menu_item).collect()
    }

    /// Delete a menu item.
    pub async fn delete_menu_item(&self, id: MenuItemId) -> Result<()> {
        sqlx::query("DELETE FROM menu_items WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete menu item")?;
        Ok(())
    }

    fn row_to_menu_item(row: &SqliteRow) -> Result<MenuItem> {
        let id_str: String = row.try_get("id")?;
        let created_at_str: String = row.try_get("created_at")?;

        Ok(MenuItem {
            id: Uuid::parse_str(&id_str).context("Invalid menu item ID")?,
            name: row.try_get("name")?,
            created_at: decode_timestamp(&created_at_str)?,
        })
    }
}
