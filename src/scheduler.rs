//! The end-of-day trigger.
//!
//! The ledger holds no timers. This scheduler owns the clock and calls
//! [`LedgerService::dispatch_daily_notifications`] once a day at a fixed UTC time.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveTime, Utc};
use tracing::{error, info};

use crate::application::LedgerService;

pub const DEFAULT_DISPATCH_TIME: &str = "20:30";

/// Parse an `HH:MM` wall-clock time.
pub fn parse_dispatch_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Invalid dispatch time '{}'. Use HH:MM", value))
}

/// The first instant strictly after `now` whose UTC wall-clock time is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return today;
    }
    now.date_naive()
        .checked_add_days(Days::new(1))
        .map(|tomorrow| tomorrow.and_time(at).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy)]
pub struct DailyScheduler {
    at: NaiveTime,
}

impl DailyScheduler {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// Dispatch every day at the configured time until `shutdown` completes.
    ///
    /// A failed run is logged and the scheduler waits for the next day.
    pub async fn run_until<F>(&self, service: &LedgerService, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "waiting for end-of-day dispatch");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = service.dispatch_daily_notifications().await {
                        error!(
                            error = %e,
                            retryable = e.is_retryable(),
                            "end-of-day dispatch failed"
                        );
                    }
                }
                _ = &mut shutdown => {
                    info!("scheduler stopped");
                    break;
                }
            }
        }
    }
}
