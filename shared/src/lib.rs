//! Shared types and inventory logic for the fresh-produce point of sale
//!
//! This crate contains the domain models and the pure parts of the inventory
//! core (expiry classification, FIFO allocation planning, ledger
//! reconciliation) shared between the backend and the WASM front-end module.

pub mod allocation;
pub mod expiry;
pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use expiry::{ExpiryClassification, ExpiryStatus};
pub use models::*;
pub use types::*;
