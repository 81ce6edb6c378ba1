pub mod application;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod scheduler;
pub mod storage;

pub use application::LedgerService;
pub use domain::*;
pub use storage::Repository;
