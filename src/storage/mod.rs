mod repository;

pub use repository::*;

/// SQL migration for customers, the transaction ledger and its sequence counter
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for the menu catalog
pub const MIGRATION_002_MENU_ITEMS: &str = include_str!("migrations/002_menu_items.sql");
