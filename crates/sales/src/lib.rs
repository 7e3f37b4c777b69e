//! Point of sale (event-sourced).
//!
//! `cart` holds the pure order arithmetic the till runs on every keystroke; `sale` is the
//! aggregate that records a sale from the first scanned item to completion.

pub mod cart;
pub mod sale;

pub use cart::{
    CartError, CartLine, CartProduct, add_product_to_order, cart_totals, cost_total,
    remove_product, update_product_quantity,
};
pub use sale::{
    AddItem, CancelSale, CompleteSale, HoldSale, OpenSale, PaymentMethod, ReceivePayment,
    RemoveItem, ResumeSale, Sale, SaleCommand, SaleCompleted, SaleEvent, SaleId, SaleStatus,
    SetCustomer, SetDiscount, UpdateQuantity, invoice_number,
};
