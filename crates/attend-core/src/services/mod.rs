//! Services shared by every kiosk shell

mod ledger;

pub use ledger::Ledger;
