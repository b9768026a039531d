//! Domain models for the perishable inventory core

mod batch;
mod ledger;
mod product;

pub use batch::*;
pub use ledger::*;
pub use product::*;
