use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use uuid::Uuid;

use crate::application::{LedgerService, NotificationOutcome};
use crate::config::{
    Config, CURRENCY_ENV_VAR, DATABASE_ENV_VAR, DEFAULT_DATABASE, DISPATCH_AT_ENV_VAR,
    EXPORT_DIR_ENV_VAR, SMS_COMMAND_ENV_VAR,
};
use crate::domain::{format_cents, parse_cents, CustomerId, Transaction, TransactionKind};
use crate::io::export_transactions_csv;
use crate::scheduler::{parse_dispatch_time, DailyScheduler, DEFAULT_DISPATCH_TIME};

/// Cafe Ledger - customer tabs for a small cafe
#[derive(Parser)]
#[command(name = "cafe-ledger")]
#[command(about = "Track customer credit, summarize the ledger and text balances")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(long, env = DATABASE_ENV_VAR, default_value = DEFAULT_DATABASE, global = true)]
    pub database: PathBuf,

    /// Directory for the daily transaction journals
    #[arg(long, env = EXPORT_DIR_ENV_VAR, default_value = ".", global = true)]
    pub export_dir: PathBuf,

    /// Do not write the daily transaction journal
    #[arg(long, global = true)]
    pub no_journal: bool,

    /// Command used to send text messages (e.g. "termux-sms-send")
    #[arg(long, env = SMS_COMMAND_ENV_VAR, global = true)]
    pub sms_command: Option<String>,

    /// Currency symbol used in text messages
    #[arg(long, env = CURRENCY_ENV_VAR, default_value = "₹", global = true)]
    pub currency: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Record a credit (raises the customer's balance)
    Credit(RecordArgs),

    /// Record a debit (lowers the customer's balance)
    Debit(RecordArgs),

    /// Record a transaction with an explicit type
    Record {
        #[command(flatten)]
        args: RecordArgs,

        /// Transaction type: credit or debit
        #[arg(short = 't', long = "type")]
        kind: String,
    },

    /// List transactions, newest first
    Transactions {
        /// Only this customer's transactions
        #[arg(long)]
        customer: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Balance of a customer before a date
    Balance {
        /// Customer ID
        customer: String,

        /// Balance before this date (YYYY-MM-DD, defaults to tomorrow, i.e. including today)
        #[arg(long)]
        before: Option<String>,
    },

    /// Opening balance, closing balance and transactions for one customer
    Summary {
        /// Customer ID
        customer: String,

        /// First day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// All transactions in a date range and the current total credit
    Daily {
        /// First day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Current total of all customer balances
    Total,

    /// Text a customer today's report
    Notify {
        /// Customer ID
        customer: String,
    },

    /// Text every customer their balance now
    Dispatch,

    /// Run the end-of-day dispatch every day until interrupted
    Scheduler {
        /// Dispatch time in UTC (HH:MM)
        #[arg(long, env = DISPATCH_AT_ENV_VAR, default_value = DEFAULT_DISPATCH_TIME)]
        at: String,
    },

    /// Menu management commands
    #[command(subcommand)]
    Menu(MenuCommands),

    /// Verify that cached balances match the ledger
    Check,

    /// Export every transaction to CSV
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
pub struct RecordArgs {
    /// Customer ID
    pub customer: String,

    /// Amount (e.g. "40" or "12.50")
    #[arg(allow_hyphen_values = true)]
    pub amount: String,

    /// What the transaction was for (e.g. a menu item)
    #[arg(short, long)]
    pub description: String,

    /// Date of the transaction (YYYY-MM-DD, defaults to now)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Add a new customer
    Add {
        /// Display name
        name: String,

        /// Phone number for balance messages
        #[arg(short, long)]
        phone: Option<String>,
    },

    /// List all customers with their balance
    List {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show customer details
    Show {
        /// Customer ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum MenuCommands {
    /// Add a menu item
    Add {
        /// Item name
        name: String,
    },

    /// List menu items
    List,

    /// Remove a menu item
    Remove {
        /// Menu item ID
        id: String,
    },
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            database: self.database.clone(),
            export_dir: self.export_dir.clone(),
            journal_enabled: !self.no_journal,
            sms_command: self.sms_command.clone(),
            currency: self.currency.clone(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        let service = match self.command {
            Commands::Init => config.init_service().await?,
            _ => config.open_service().await?,
        };
        let result = run_command(&service, &config, self.command).await;
        service.close().await;
        result
    }
}

async fn run_command(service: &LedgerService, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Database initialized: {}", config.database.display());
        }

        Commands::Customer(cmd) => run_customer_command(service, cmd).await?,

        Commands::Credit(args) => run_record_command(service, args, TransactionKind::Credit.as_str()).await?,

        Commands::Debit(args) => run_record_command(service, args, TransactionKind::Debit.as_str()).await?,

        Commands::Record { args, kind } => run_record_command(service, args, &kind).await?,

        Commands::Transactions {
            customer,
            limit,
            format,
        } => run_transactions_command(service, customer, limit, format).await?,

        Commands::Balance { customer, before } => {
            let customer_id = parse_customer_id(&customer)?;
            let before = match before {
                Some(date) => parse_date(&date)?,
                None => Utc::now()
                    .date_naive()
                    .succ_opt()
                    .context("Date out of range")?,
            };
            let balance = service.point_in_time_balance(customer_id, before).await?;
            println!("Balance before {}: {}", before, format_cents(balance));
        }

        Commands::Summary {
            customer,
            from,
            to,
            format,
        } => {
            let customer_id = parse_customer_id(&customer)?;
            run_summary_command(service, customer_id, from, to, format).await?
        }

        Commands::Daily { from, to, format } => {
            run_daily_command(service, from, to, format).await?
        }

        Commands::Total => {
            let total = service.total_credits().await?;
            println!("Total credit: {}", format_cents(total));
        }

        Commands::Notify { customer } => {
            let customer_id = parse_customer_id(&customer)?;
            match service.notify_customer_daily_report(customer_id).await? {
                NotificationOutcome::Sent => println!("Daily report sent."),
                NotificationOutcome::Skipped => {
                    println!("Customer has no phone number; nothing sent.")
                }
                NotificationOutcome::Failed(reason) => {
                    println!("Daily report could not be delivered: {}", reason)
                }
            }
        }

        Commands::Dispatch => {
            let report = service.dispatch_daily_notifications().await?;
            println!(
                "Sent {}, skipped {} (no phone), failed {}",
                report.sent, report.skipped, report.failed
            );
        }

        Commands::Scheduler { at } => {
            let at = parse_dispatch_time(&at)?;
            let scheduler = DailyScheduler::new(at);
            println!(
                "Dispatching balances daily at {} UTC. Press Ctrl-C to stop.",
                scheduler.at().format("%H:%M")
            );
            scheduler
                .run_until(service, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
        }

        Commands::Menu(cmd) => run_menu_command(service, cmd).await?,

        Commands::Check => run_check_command(service).await?,

        Commands::Export { output } => {
            let mut transactions = service.list_transactions().await?;
            transactions.reverse();
            let count = match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    export_transactions_csv(&transactions, file)?
                }
                None => export_transactions_csv(&transactions, std::io::stdout().lock())?,
            };
            eprintln!("Exported {} transaction(s)", count);
        }
    }

    Ok(())
}

async fn run_customer_command(service: &LedgerService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add { name, phone } => {
            let customer = service.create_customer(name, phone).await?;
            println!("Created customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::List { format } => {
            let customers = service.list_customers().await?;
            match format {
                OutputFormat::Json => print_json(&customers)?,
                OutputFormat::Table if customers.is_empty() => println!("No customers found."),
                OutputFormat::Table => {
                    println!(
                        "{:<36}  {:<20} {:<15} {:>12}",
                        "ID", "NAME", "PHONE", "CREDIT"
                    );
                    println!("{}", "-".repeat(87));
                    for customer in &customers {
                        println!(
                            "{:<36}  {:<20} {:<15} {:>12}",
                            customer.id,
                            truncate(&customer.name, 20),
                            customer.phone.as_deref().unwrap_or("-"),
                            format_cents(customer.credit)
                        );
                    }
                    let total: i64 = customers.iter().map(|c| c.credit).sum();
                    println!("{}", "-".repeat(87));
                    println!("{:<74}{:>13}", "TOTAL", format_cents(total));
                }
            }
        }

        CustomerCommands::Show { id } => {
            let info = service.get_customer_info(parse_customer_id(&id)?).await?;
            println!("Customer: {}", info.customer.name);
            println!("ID:       {}", info.customer.id);
            println!(
                "Phone:    {}",
                info.customer.phone.as_deref().unwrap_or("-")
            );
            println!("Since:    {}", info.customer.created_date);
            println!("Credit:   {}", format_cents(info.customer.credit));
            println!("Entries:  {}", info.transaction_count);
            if let Some(last) = info.last_activity {
                println!("Last:     {}", last.format("%Y-%m-%d %H:%M"));
            }
        }
    }
    Ok(())
}

async fn run_record_command(service: &LedgerService, args: RecordArgs, kind: &str) -> Result<()> {
    let customer_id = parse_customer_id(&args.customer)?;
    let amount_cents =
        parse_cents(&args.amount).context("Invalid amount format. Use '40' or '12.50'")?;

    let timestamp = match args.date {
        Some(date) => date_to_timestamp(parse_date(&date)?),
        None => Utc::now(),
    };

    let recorded = service
        .record_transaction_at(customer_id, amount_cents, &args.description, kind, timestamp)
        .await?;

    println!(
        "Recorded {} {} for {} ({}). Balance: {}",
        recorded.transaction.kind,
        format_cents(recorded.transaction.amount_cents.abs()),
        recorded.customer_name,
        recorded.transaction.id,
        format_cents(recorded.balance)
    );
    Ok(())
}

async fn run_transactions_command(
    service: &LedgerService,
    customer: Option<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut transactions = match customer {
        Some(id) => {
            let mut ledger = service
                .list_customer_transactions(parse_customer_id(&id)?)
                .await?;
            ledger.reverse();
            ledger
        }
        None => service.list_transactions().await?,
    };
    if let Some(limit) = limit {
        transactions.truncate(limit);
    }

    match format {
        OutputFormat::Json => print_json(&transactions)?,
        OutputFormat::Table => {
            let names = customer_names(service).await?;
            print_transactions(&transactions, &names);
        }
    }
    Ok(())
}

async fn run_summary_command(
    service: &LedgerService,
    customer_id: CustomerId,
    from: Option<String>,
    to: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let from = from.map(|d| parse_date(&d)).transpose()?;
    let to = to.map(|d| parse_date(&d)).transpose()?;

    let summary = service.range_summary(customer_id, from, to).await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            let customer = service.get_customer(customer_id).await?;
            println!(
                "{}: {} to {}",
                customer.name, summary.start_date, summary.end_date
            );
            println!("Opening balance: {:>12}", format_cents(summary.opening));
            println!();
            if summary.transactions.is_empty() {
                println!("No transactions in range.");
            } else {
                let names = HashMap::from([(customer.id, customer.name.clone())]);
                print_transactions(&summary.transactions, &names);
            }
            println!();
            println!(
                "Net change:      {:>12}",
                summary
                    .net_change()
                    .map(format_cents)
                    .unwrap_or_else(|| "out of range".to_string())
            );
            println!("Closing balance: {:>12}", format_cents(summary.closing));
        }
    }
    Ok(())
}

async fn run_daily_command(
    service: &LedgerService,
    from: Option<String>,
    to: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let from = from.map(|d| parse_date(&d)).transpose()?;
    let to = to.map(|d| parse_date(&d)).transpose()?;

    let summary = service.global_daily_summary(from, to).await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            println!("Transactions {} to {}", summary.start_date, summary.end_date);
            println!();
            if summary.transactions.is_empty() {
                println!("No transactions in range.");
            } else {
                let names = customer_names(service).await?;
                print_transactions(&summary.transactions, &names);
            }
            println!();
            println!(
                "Total credit now: {}",
                format_cents(summary.total_credits_now)
            );
        }
    }
    Ok(())
}

async fn run_menu_command(service: &LedgerService, cmd: MenuCommands) -> Result<()> {
    match cmd {
        MenuCommands::Add { name } => {
            let item = service.add_menu_item(&name).await?;
            println!("Added menu item: {} ({})", item.name, item.id);
        }
        MenuCommands::List => {
            let items = service.list_menu_items().await?;
            if items.is_empty() {
                println!("No menu items.");
            }
            for item in items {
                println!("{:<36}  {}", item.id, item.name);
            }
        }
        MenuCommands::Remove { id } => {
            let id = Uuid::parse_str(&id).context("Invalid menu item ID format (expected UUID)")?;
            let item = service.remove_menu_item(id).await?;
            println!("Removed menu item: {}", item.name);
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Customers:    {}", report.customer_count);
    println!("Transactions: {}", report.transaction_count);
    println!();

    if report.is_healthy() {
        println!("All cached balances match the ledger.");
        return Ok(());
    }

    for mismatch in &report.mismatches {
        println!(
            "MISMATCH {} ({}): cached {} but ledger replays to {}",
            mismatch.customer_name,
            mismatch.customer_id,
            format_cents(mismatch.cached),
            mismatch
                .replayed
                .map(format_cents)
                .unwrap_or_else(|| "an out-of-range value".to_string())
        );
    }
    if report.orphaned_transactions > 0 {
        println!(
            "{} transaction(s) reference unknown customers",
            report.orphaned_transactions
        );
    }
    anyhow::bail!("ledger integrity check failed")
}

async fn customer_names(service: &LedgerService) -> Result<HashMap<CustomerId, String>> {
    Ok(service
        .list_customers()
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

fn print_transactions(transactions: &[Transaction], names: &HashMap<CustomerId, String>) {
    println!(
        "{:<17} {:<20} {:<7} {:>10}  DESCRIPTION",
        "TIME", "CUSTOMER", "TYPE", "AMOUNT"
    );
    println!("{}", "-".repeat(80));
    for tx in transactions {
        let name = names.get(&tx.customer_id).map(|s| s.as_str()).unwrap_or("?");
        println!(
            "{:<17} {:<20} {:<7} {:>10}  {}",
            tx.timestamp.format("%Y-%m-%d %H:%M"),
            truncate(name, 20),
            tx.kind.as_str(),
            format_cents(tx.signed_amount()),
            truncate(&tx.description, 30)
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_customer_id(value: &str) -> Result<CustomerId> {
    Uuid::parse_str(value.trim()).context("Invalid customer ID format (expected UUID)")
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))
}

/// Back-dated entries are stamped at noon UTC so they land on the intended day.
fn date_to_timestamp(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}
