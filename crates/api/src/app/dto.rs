//! Request bodies and the few response rows that join read models.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_auth::Role;
use retailpos_catalog::{ProductDetails, ProductId, ProductStatus};
use retailpos_core::{Discount, Money, Searchable, UserId};
use retailpos_hr::{AttendanceStatus, EmployeeId, EmployeeProfile};
use retailpos_infra::projections::{ProductReadModel, StockReadModel};
use retailpos_parties::{ContactInfo, CustomerRef, PartyId};
use retailpos_sales::PaymentMethod;

// -------------------------
// Catalogue
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReferenceRequest {
    pub name: String,
    pub short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub code: String,
    #[serde(flatten)]
    pub details: ProductDetails,
    /// Recorded as the product's opening stock movement when positive.
    pub opening_stock: Option<i64>,
}

// -------------------------
// Inventory
// -------------------------

#[derive(Debug, Deserialize)]
pub struct StockMovementRequest {
    pub quantity: i64,
    pub note: Option<String>,
}

/// Product joined with its stock level, for the inventory list.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRow {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub status: ProductStatus,
    pub on_hand: i64,
    pub reorder_level: i64,
    pub low_stock: bool,
    pub cost_price: Money,
    /// Cost value of the on-hand quantity (zero when on-hand is negative).
    pub stock_value: Money,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl InventoryRow {
    pub fn new(product: ProductReadModel, stock: Option<&StockReadModel>) -> Self {
        let on_hand = stock.map_or(0, |s| s.on_hand);
        Self {
            product_id: product.product_id,
            low_stock: on_hand <= product.reorder_level,
            stock_value: product.cost_price.times(on_hand.max(0)),
            last_movement_at: stock.and_then(|s| s.last_movement_at),
            code: product.code,
            name: product.name,
            status: product.status,
            on_hand,
            reorder_level: product.reorder_level,
            cost_price: product.cost_price,
        }
    }
}

impl Searchable for InventoryRow {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.code.as_str(), self.name.as_str()]
    }
}

// -------------------------
// Parties
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterPartyRequest {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub opening_balance: Money,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePartyRequest {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

// -------------------------
// HR
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterEmployeeRequest {
    #[serde(flatten)]
    pub profile: EmployeeProfile,
    pub monthly_salary: Money,
}

#[derive(Debug, Deserialize)]
pub struct ChangeSalaryRequest {
    pub monthly_salary: Money,
}

#[derive(Debug, Deserialize)]
pub struct PaySalaryRequest {
    pub amount: Money,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub employee_id: EmployeeId,
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceDayQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPayrollRequest {
    pub year: i32,
    pub month: u32,
}

// -------------------------
// POS
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct OpenSaleRequest {
    #[serde(default)]
    pub customer: CustomerRef,
}

/// Scan by id or by product code.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<ProductId>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub discount: Discount,
}

#[derive(Debug, Deserialize)]
pub struct SetCustomerRequest {
    pub customer: CustomerRef,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoldSaleRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteSaleRequest {
    pub paid: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct SalePaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
}

// -------------------------
// Purchasing
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub supplier_id: PartyId,
    pub supplier_reference: Option<String>,
    /// Defaults to today (UTC).
    pub purchase_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Defaults to the product's current cost price.
    pub unit_cost: Option<Money>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceivePurchaseRequest {
    #[serde(default)]
    pub paid: Money,
}

#[derive(Debug, Deserialize)]
pub struct PurchasePaymentRequest {
    pub amount: Money,
}

// -------------------------
// Users
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// The identity provider's subject; generated when omitted.
    pub user_id: Option<UserId>,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub permission: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendUserRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkEmployeeRequest {
    pub employee_id: Option<EmployeeId>,
}
