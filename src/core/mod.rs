pub mod binding;
pub mod commit;
pub mod config;
pub mod expander;
pub mod grammar;
pub mod ledger;
pub mod populate;
