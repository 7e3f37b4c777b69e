use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_catalog::ProductId;
use retailpos_core::{Aggregate, AggregateRoot, DomainError, MAX_QUANTITY, TenantId};
use retailpos_events::Event;

/// Stream type. The stream id is the product id.
pub const AGGREGATE_TYPE: &str = "inventory.stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Opening,
    Purchase,
    Sale,
    Adjustment,
}

impl MovementKind {
    /// Movements that mirror a sale or purchase document.
    pub fn is_document(self) -> bool {
        matches!(self, MovementKind::Purchase | MovementKind::Sale)
    }
}

/// Aggregate root: StockItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: ProductId,
    tenant_id: Option<TenantId>,
    on_hand: i64,
    movements: u64,
    applied_references: BTreeSet<String>,
    last_movement_at: Option<DateTime<Utc>>,
    version: u64,
}

impl StockItem {
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            on_hand: 0,
            movements: 0,
            applied_references: BTreeSet::new(),
            last_movement_at: None,
            version: 0,
        }
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn movement_count(&self) -> u64 {
        self.movements
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    pub fn has_applied(&self, reference: &str) -> bool {
        self.applied_references.contains(reference)
    }
}

impl AggregateRoot for StockItem {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordMovement.
///
/// `quantity` is signed: positive adds stock, negative removes it.
/// `reference` is the sale or purchase id for document movements, free text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    RecordMovement(RecordMovement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub on_hand_after: i64,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    MovementRecorded(MovementRecorded),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementRecorded(_) => "inventory.stock.movement_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::MovementRecorded(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.on_hand = e.on_hand_after;
                self.movements += 1;
                self.last_movement_at = Some(e.occurred_at);
                if e.kind.is_document() {
                    if let Some(reference) = &e.reference {
                        self.applied_references.insert(reference.clone());
                    }
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::RecordMovement(cmd) => self.handle_record(cmd),
        }
    }
}

impl StockItem {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.tenant_id {
            Some(t) if t != tenant_id => Err(DomainError::invariant("tenant mismatch")),
            _ => Ok(()),
        }
    }

    fn handle_record(&self, cmd: &RecordMovement) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity cannot be zero"));
        }
        if cmd.quantity.unsigned_abs() > MAX_QUANTITY.unsigned_abs() {
            return Err(DomainError::validation(format!(
                "quantity cannot exceed {MAX_QUANTITY}"
            )));
        }
        let on_hand_after = self
            .on_hand
            .checked_add(cmd.quantity)
            .ok_or_else(|| DomainError::validation("stock level out of range"))?;

        let reference = cmd
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        match cmd.kind {
            MovementKind::Opening => {
                if self.movements > 0 {
                    return Err(DomainError::invariant(
                        "opening stock must be the first movement",
                    ));
                }
                if cmd.quantity < 0 {
                    return Err(DomainError::validation("opening stock must be positive"));
                }
            }
            MovementKind::Adjustment => {
                if on_hand_after < 0 {
                    return Err(DomainError::invariant(format!(
                        "adjustment would take stock below zero (on hand: {})",
                        self.on_hand
                    )));
                }
            }
            MovementKind::Purchase | MovementKind::Sale => {
                let Some(reference) = reference.as_deref() else {
                    return Err(DomainError::validation("document movements need a reference"));
                };
                if cmd.kind == MovementKind::Purchase && cmd.quantity < 0 {
                    return Err(DomainError::validation("purchase quantity must be positive"));
                }
                if cmd.kind == MovementKind::Sale && cmd.quantity > 0 {
                    return Err(DomainError::validation("sale quantity must be negative"));
                }
                if self.has_applied(reference) {
                    return Ok(vec![]);
                }
            }
        }

        Ok(vec![StockEvent::MovementRecorded(MovementRecorded {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            kind: cmd.kind,
            quantity: cmd.quantity,
            on_hand_after,
            reference,
            note: cmd.note.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            occurred_at: cmd.occurred_at,
        })])
    }
}
