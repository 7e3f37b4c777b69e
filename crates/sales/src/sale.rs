use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_catalog::ProductId;
use retailpos_core::{
    Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Money, TenantId, Totals, UserId,
};
use retailpos_events::Event;
use retailpos_parties::CustomerRef;

use crate::cart::{
    CartLine, CartProduct, add_product_to_order, cart_totals, cost_total, remove_product,
    update_product_quantity,
};

pub const AGGREGATE_TYPE: &str = "sales.sale";

/// Sale identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Printed invoice number: `INV-` and the last eight hex digits of the sale id.
///
/// The tail of a v7 id is random, so numbers issued on the same day do not share a prefix.
pub fn invoice_number(sale_id: SaleId) -> String {
    let hex = sale_id.0.as_uuid().simple().to_string().to_ascii_uppercase();
    format!("INV-{}", &hex[hex.len() - 8..])
}

/// Sale lifecycle: `Open` and `Held` go back and forth until the sale is completed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Open,
    Held,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    cashier: Option<UserId>,
    customer: CustomerRef,
    lines: Vec<CartLine>,
    discount: Discount,
    status: SaleStatus,
    totals: Option<Totals>,
    payments_received: Money,
    version: u64,
    created: bool,
}

impl Sale {
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            cashier: None,
            customer: CustomerRef::WalkIn,
            lines: Vec::new(),
            discount: Discount::None,
            status: SaleStatus::Open,
            totals: None,
            payments_received: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn cashier(&self) -> Option<UserId> {
        self.cashier
    }

    pub fn customer(&self) -> CustomerRef {
        self.customer
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    /// Totals fixed at completion; `None` while the cart is still being built.
    pub fn totals(&self) -> Option<Totals> {
        self.totals
    }

    /// Running totals of the cart as it stands, with nothing paid.
    pub fn preview(&self) -> Totals {
        cart_totals(&self.lines, &self.discount, Money::ZERO)
    }

    /// What the customer still owes after completion and later payments.
    pub fn outstanding(&self) -> Money {
        self.totals
            .map_or(Money::ZERO, |t| (t.due - self.payments_received).max(Money::ZERO))
    }

    pub fn is_editable(&self) -> bool {
        self.created && self.status == SaleStatus::Open
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub cashier: UserId,
    pub customer: CustomerRef,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub product: CartProduct,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantity {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub available: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiscount {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// The caller checks that a registered customer exists and can transact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCustomer {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer: CustomerRef,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub cashier: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub cashier: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub paid: Money,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivePayment {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    Open(OpenSale),
    AddItem(AddItem),
    UpdateQuantity(UpdateQuantity),
    RemoveItem(RemoveItem),
    SetDiscount(SetDiscount),
    SetCustomer(SetCustomer),
    Hold(HoldSale),
    Resume(ResumeSale),
    Complete(CompleteSale),
    ReceivePayment(ReceivePayment),
    Cancel(CancelSale),
}

/// Event: SaleCompleted. Carries the full line snapshot for stock sync and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCompleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub invoice_no: String,
    pub cashier: UserId,
    pub customer: CustomerRef,
    pub lines: Vec<CartLine>,
    pub discount: Discount,
    pub totals: Totals,
    pub cost_total: Money,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    Opened {
        tenant_id: TenantId,
        sale_id: SaleId,
        cashier: UserId,
        customer: CustomerRef,
        occurred_at: DateTime<Utc>,
    },
    ItemAdded {
        tenant_id: TenantId,
        sale_id: SaleId,
        line: CartLine,
        occurred_at: DateTime<Utc>,
    },
    QuantityChanged {
        tenant_id: TenantId,
        sale_id: SaleId,
        product_id: ProductId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
    ItemRemoved {
        tenant_id: TenantId,
        sale_id: SaleId,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    },
    DiscountSet {
        tenant_id: TenantId,
        sale_id: SaleId,
        discount: Discount,
        occurred_at: DateTime<Utc>,
    },
    CustomerSet {
        tenant_id: TenantId,
        sale_id: SaleId,
        customer: CustomerRef,
        occurred_at: DateTime<Utc>,
    },
    Held {
        tenant_id: TenantId,
        sale_id: SaleId,
        cashier: UserId,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Resumed {
        tenant_id: TenantId,
        sale_id: SaleId,
        cashier: UserId,
        occurred_at: DateTime<Utc>,
    },
    Completed(SaleCompleted),
    PaymentReceived {
        tenant_id: TenantId,
        sale_id: SaleId,
        amount: Money,
        method: PaymentMethod,
        received_by: UserId,
        outstanding_after: Money,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        tenant_id: TenantId,
        sale_id: SaleId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl SaleEvent {
    pub fn sale_id(&self) -> SaleId {
        match self {
            SaleEvent::Completed(e) => e.sale_id,
            SaleEvent::Opened { sale_id, .. }
            | SaleEvent::ItemAdded { sale_id, .. }
            | SaleEvent::QuantityChanged { sale_id, .. }
            | SaleEvent::ItemRemoved { sale_id, .. }
            | SaleEvent::DiscountSet { sale_id, .. }
            | SaleEvent::CustomerSet { sale_id, .. }
            | SaleEvent::Held { sale_id, .. }
            | SaleEvent::Resumed { sale_id, .. }
            | SaleEvent::PaymentReceived { sale_id, .. }
            | SaleEvent::Cancelled { sale_id, .. } => *sale_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            SaleEvent::Completed(e) => e.tenant_id,
            SaleEvent::Opened { tenant_id, .. }
            | SaleEvent::ItemAdded { tenant_id, .. }
            | SaleEvent::QuantityChanged { tenant_id, .. }
            | SaleEvent::ItemRemoved { tenant_id, .. }
            | SaleEvent::DiscountSet { tenant_id, .. }
            | SaleEvent::CustomerSet { tenant_id, .. }
            | SaleEvent::Held { tenant_id, .. }
            | SaleEvent::Resumed { tenant_id, .. }
            | SaleEvent::PaymentReceived { tenant_id, .. }
            | SaleEvent::Cancelled { tenant_id, .. } => *tenant_id,
        }
    }
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::Opened { .. } => "sales.sale.opened",
            SaleEvent::ItemAdded { .. } => "sales.sale.item_added",
            SaleEvent::QuantityChanged { .. } => "sales.sale.quantity_changed",
            SaleEvent::ItemRemoved { .. } => "sales.sale.item_removed",
            SaleEvent::DiscountSet { .. } => "sales.sale.discount_set",
            SaleEvent::CustomerSet { .. } => "sales.sale.customer_set",
            SaleEvent::Held { .. } => "sales.sale.held",
            SaleEvent::Resumed { .. } => "sales.sale.resumed",
            SaleEvent::Completed(_) => "sales.sale.completed",
            SaleEvent::PaymentReceived { .. } => "sales.sale.payment_received",
            SaleEvent::Cancelled { .. } => "sales.sale.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::Completed(e) => e.occurred_at,
            SaleEvent::Opened { occurred_at, .. }
            | SaleEvent::ItemAdded { occurred_at, .. }
            | SaleEvent::QuantityChanged { occurred_at, .. }
            | SaleEvent::ItemRemoved { occurred_at, .. }
            | SaleEvent::DiscountSet { occurred_at, .. }
            | SaleEvent::CustomerSet { occurred_at, .. }
            | SaleEvent::Held { occurred_at, .. }
            | SaleEvent::Resumed { occurred_at, .. }
            | SaleEvent::PaymentReceived { occurred_at, .. }
            | SaleEvent::Cancelled { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::Opened {
                tenant_id,
                sale_id,
                cashier,
                customer,
                ..
            } => {
                self.id = *sale_id;
                self.tenant_id = Some(*tenant_id);
                self.cashier = Some(*cashier);
                self.customer = *customer;
                self.status = SaleStatus::Open;
                self.created = true;
            }
            SaleEvent::ItemAdded { line, .. } => self.lines.push(line.clone()),
            SaleEvent::QuantityChanged {
                product_id, quantity, ..
            } => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == *product_id) {
                    line.quantity = *quantity;
                }
            }
            SaleEvent::ItemRemoved { product_id, .. } => {
                self.lines.retain(|l| l.product_id != *product_id)
            }
            SaleEvent::DiscountSet { discount, .. } => self.discount = *discount,
            SaleEvent::CustomerSet { customer, .. } => self.customer = *customer,
            SaleEvent::Held { cashier, .. } => {
                self.cashier = Some(*cashier);
                self.status = SaleStatus::Held;
            }
            SaleEvent::Resumed { .. } => self.status = SaleStatus::Open,
            SaleEvent::Completed(e) => {
                self.lines = e.lines.clone();
                self.totals = Some(e.totals);
                self.status = SaleStatus::Completed;
            }
            SaleEvent::PaymentReceived { amount, .. } => self.payments_received += *amount,
            SaleEvent::Cancelled { .. } => self.status = SaleStatus::Cancelled,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::Open(cmd) => self.handle_open(cmd),
            SaleCommand::AddItem(cmd) => self.handle_add_item(cmd),
            SaleCommand::UpdateQuantity(cmd) => self.handle_update_quantity(cmd),
            SaleCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            SaleCommand::SetDiscount(cmd) => self.handle_set_discount(cmd),
            SaleCommand::SetCustomer(cmd) => self.handle_set_customer(cmd),
            SaleCommand::Hold(cmd) => self.handle_hold(cmd),
            SaleCommand::Resume(cmd) => self.handle_resume(cmd),
            SaleCommand::Complete(cmd) => self.handle_complete(cmd),
            SaleCommand::ReceivePayment(cmd) => self.handle_receive_payment(cmd),
            SaleCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Sale {
    fn ensure_exists(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }

    fn ensure_editable(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<(), DomainError> {
        self.ensure_exists(tenant_id, sale_id)?;
        match self.status {
            SaleStatus::Open => Ok(()),
            SaleStatus::Held => Err(DomainError::invariant("resume the held sale before changing it")),
            SaleStatus::Completed | SaleStatus::Cancelled => {
                Err(DomainError::invariant("cannot modify a completed or cancelled sale"))
            }
        }
    }

    fn handle_open(&self, cmd: &OpenSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }

        Ok(vec![SaleEvent::Opened {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            cashier: cmd.cashier,
            customer: cmd.customer,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;

        let existed = self.lines.iter().any(|l| l.product_id == cmd.product.product_id);
        let mut lines = self.lines.clone();
        let quantity = add_product_to_order(&mut lines, &cmd.product)?;

        if existed {
            return Ok(vec![SaleEvent::QuantityChanged {
                tenant_id: cmd.tenant_id,
                sale_id: cmd.sale_id,
                product_id: cmd.product.product_id,
                quantity,
                occurred_at: cmd.occurred_at,
            }]);
        }
        let line = lines
            .into_iter()
            .find(|l| l.product_id == cmd.product.product_id)
            .ok_or_else(|| DomainError::invariant("added line missing from cart"))?;
        Ok(vec![SaleEvent::ItemAdded {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            line,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update_quantity(&self, cmd: &UpdateQuantity) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;

        let current = self
            .lines
            .iter()
            .find(|l| l.product_id == cmd.product_id)
            .map(|l| l.quantity);
        if current == Some(cmd.quantity) {
            return Ok(vec![]);
        }
        let mut lines = self.lines.clone();
        update_product_quantity(&mut lines, cmd.product_id, cmd.quantity, cmd.available)?;

        if cmd.quantity == 0 {
            return Ok(vec![SaleEvent::ItemRemoved {
                tenant_id: cmd.tenant_id,
                sale_id: cmd.sale_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            }]);
        }
        Ok(vec![SaleEvent::QuantityChanged {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;
        let mut lines = self.lines.clone();
        remove_product(&mut lines, cmd.product_id)?;

        Ok(vec![SaleEvent::ItemRemoved {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_set_discount(&self, cmd: &SetDiscount) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;
        cmd.discount.validate()?;
        if cmd.discount == self.discount {
            return Ok(vec![]);
        }

        Ok(vec![SaleEvent::DiscountSet {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            discount: cmd.discount,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_set_customer(&self, cmd: &SetCustomer) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;
        if cmd.customer == self.customer {
            return Ok(vec![]);
        }

        Ok(vec![SaleEvent::CustomerSet {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            customer: cmd.customer,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_hold(&self, cmd: &HoldSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot hold an empty cart"));
        }

        Ok(vec![SaleEvent::Held {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            cashier: cmd.cashier,
            note: cmd.note.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_resume(&self, cmd: &ResumeSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        if self.status != SaleStatus::Held {
            return Err(DomainError::invariant("only held sales can be resumed"));
        }
        if self.cashier != Some(cmd.cashier) {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![SaleEvent::Resumed {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            cashier: cmd.cashier,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_complete(&self, cmd: &CompleteSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_editable(cmd.tenant_id, cmd.sale_id)?;
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot complete a sale without items"));
        }
        if cmd.paid.is_negative() {
            return Err(DomainError::validation("paid amount cannot be negative"));
        }
        let totals = cart_totals(&self.lines, &self.discount, cmd.paid);
        if self.customer.is_walk_in() && totals.due.is_positive() {
            return Err(DomainError::validation(format!(
                "walk-in customers must pay in full: {} still due",
                totals.due
            )));
        }
        let cashier = self
            .cashier
            .ok_or_else(|| DomainError::invariant("sale has no cashier"))?;

        Ok(vec![SaleEvent::Completed(SaleCompleted {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            invoice_no: invoice_number(cmd.sale_id),
            cashier,
            customer: self.customer,
            lines: self.lines.clone(),
            discount: self.discount,
            totals,
            cost_total: cost_total(&self.lines),
            method: cmd.method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive_payment(&self, cmd: &ReceivePayment) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        if self.status != SaleStatus::Completed {
            return Err(DomainError::invariant("payments can only be received on completed sales"));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        let outstanding = self.outstanding();
        if cmd.amount > outstanding {
            return Err(DomainError::validation(format!(
                "payment {} exceeds amount due {}",
                cmd.amount, outstanding
            )));
        }

        Ok(vec![SaleEvent::PaymentReceived {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            amount: cmd.amount,
            method: cmd.method,
            received_by: cmd.received_by,
            outstanding_after: outstanding - cmd.amount,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.sale_id)?;
        if !matches!(self.status, SaleStatus::Open | SaleStatus::Held) {
            return Err(DomainError::invariant("only open or held sales can be cancelled"));
        }

        Ok(vec![SaleEvent::Cancelled {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}
