mod customer;
mod ledger;
mod menu;
mod money;
mod transaction;

pub use customer::*;
pub use ledger::*;
pub use menu::*;
pub use money::*;
pub use transaction::*;
