// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Result;
use async_trait::async_trait;
use cafe_ledger::application::LedgerService;
use cafe_ledger::domain::{Customer, Transaction};
use cafe_ledger::io::{Notifier, NotifyError, TransactionSink};
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(db_path(&temp_dir).to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test service whose text messages land in a [`RecordingNotifier`]
pub async fn test_service_with_notifier(
    notifier: Arc<RecordingNotifier>,
) -> Result<(LedgerService, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    Ok((service.with_notifier(notifier), temp_dir))
}

pub fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("test.db")
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// A timestamp on the given day at the given UTC hour
pub fn at(date_str: &str, hour: u32) -> DateTime<Utc> {
    parse_date(date_str).and_hms_opt(hour, 0, 0).unwrap().and_utc()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Test fixture: a few regulars
pub struct Regulars {
    pub asha: Customer,
    pub ravi: Customer,
    pub meera: Customer,
}

impl Regulars {
    /// Asha and Ravi have phones, Meera does not
    pub async fn create(service: &LedgerService) -> Result<Self> {
        let asha = service
            .create_customer("Asha", Some("+919800000001".into()))
            .await?;
        let ravi = service
            .create_customer("Ravi", Some("+919800000002".into()))
            .await?;
        let meera = service.create_customer("Meera", None).await?;
        Ok(Self { asha, ravi, meera })
    }
}

/// Notifier that remembers every message and can be told to fail for some phones
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(phones: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: phones.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn message_for(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .find(|(p, _)| p == phone)
            .map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        if self.failing.contains(phone) {
            return Err(NotifyError::Rejected(format!("no signal for {}", phone)));
        }
        self.sent
            .lock()
            .await
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

/// Sink that keeps appended transactions in memory
#[derive(Default)]
pub struct RecordingSink {
    appended: StdMutex<Vec<Transaction>>,
}

impl RecordingSink {
    pub fn appended(&self) -> Vec<Transaction> {
        self.appended.lock().unwrap().clone()
    }
}

impl TransactionSink for RecordingSink {
    fn append(&self, transaction: &Transaction) -> Result<()> {
        self.appended.lock().unwrap().push(transaction.clone());
        Ok(())
    }
}

/// Sink that always fails
pub struct FailingSink;

impl TransactionSink for FailingSink {
    fn append(&self, _transaction: &Transaction) -> Result<()> {
        anyhow::bail!("disk full")
    }
}
