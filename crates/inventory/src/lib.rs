//! Stock ledger per product (event-sourced).
//!
//! Every change in on-hand quantity is a movement: the opening balance, goods received
//! from a purchase, goods sold, or a manual adjustment after a count.

pub mod stock;

pub use stock::{
    MovementKind, MovementRecorded, RecordMovement, StockCommand, StockEvent, StockItem,
};
