//! Purchases from suppliers (event-sourced).
//!
//! A purchase is drafted line by line, then received in one step; receiving is what puts
//! the goods into stock and opens the supplier payable.

pub mod purchase;

pub use purchase::{
    AddPurchaseLine, CancelPurchase, CreatePurchase, PayPurchase, Purchase, PurchaseCommand,
    PurchaseEvent, PurchaseId, PurchaseLine, PurchaseReceived, PurchaseStatus, ReceivePurchase,
    RemovePurchaseLine, SetPurchaseDiscount,
};
