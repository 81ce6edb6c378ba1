// Application layer: the ledger engine surface used by the CLI, the scheduler and tests.

pub mod error;
pub mod service;
pub mod summary;

pub use error::*;
pub use service::*;
pub use summary::*;
