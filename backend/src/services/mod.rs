//! Business logic services for the fresh-produce inventory core

pub mod clock;
pub mod export;
pub mod inventory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use export::export_to_csv;
pub use inventory::InventoryService;
