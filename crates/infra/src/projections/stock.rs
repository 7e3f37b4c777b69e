use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_catalog::ProductId;
use retailpos_core::TenantId;
use retailpos_events::EventEnvelope;
use retailpos_inventory::stock::AGGREGATE_TYPE;
use retailpos_inventory::{MovementKind, StockEvent};

use super::{Projection, ProjectionError, ProductReadModel, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovementRow {
    pub kind: MovementKind,
    pub quantity: i64,
    pub on_hand_after: i64,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// On-hand quantity of one product with its movement history (oldest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockReadModel {
    pub product_id: ProductId,
    pub on_hand: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub movements: Vec<StockMovementRow>,
}

impl StockReadModel {
    fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            on_hand: 0,
            last_movement_at: None,
            movements: Vec::new(),
        }
    }
}

/// A product at or below its reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockRow {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub on_hand: i64,
    pub reorder_level: i64,
}

#[derive(Debug)]
pub struct StockProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> StockProjection<S>
where
    S: TenantStore<ProductId, StockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<StockReadModel> {
        self.store.get(tenant_id, product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<StockReadModel> {
        self.store.list(tenant_id)
    }

    /// On-hand quantity; a product without movements has none.
    pub fn on_hand(&self, tenant_id: TenantId, product_id: &ProductId) -> i64 {
        self.get(tenant_id, product_id).map_or(0, |s| s.on_hand)
    }

    /// Active products whose on-hand quantity is at or below their reorder level, lowest first.
    pub fn low_stock(&self, tenant_id: TenantId, products: &[ProductReadModel]) -> Vec<LowStockRow> {
        let mut rows: Vec<LowStockRow> = products
            .iter()
            .filter(|p| p.status == retailpos_catalog::ProductStatus::Active)
            .filter_map(|p| {
                let on_hand = self.on_hand(tenant_id, &p.product_id);
                (on_hand <= p.reorder_level).then(|| LowStockRow {
                    product_id: p.product_id,
                    code: p.code.clone(),
                    name: p.name.clone(),
                    on_hand,
                    reorder_level: p.reorder_level,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.on_hand.cmp(&b.on_hand).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}

impl<S> Projection for StockProjection<S>
where
    S: TenantStore<ProductId, StockReadModel>,
{
    fn name(&self) -> &'static str {
        "inventory.stock"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let StockEvent::MovementRecorded(e) = decode::<StockEvent>(envelope)?;
        ensure_scope(envelope, e.tenant_id, e.product_id.0)?;

        let mut rm = self
            .store
            .get(e.tenant_id, &e.product_id)
            .unwrap_or_else(|| StockReadModel::empty(e.product_id));
        rm.on_hand = e.on_hand_after;
        rm.last_movement_at = Some(e.occurred_at);
        rm.movements.push(StockMovementRow {
            kind: e.kind,
            quantity: e.quantity,
            on_hand_after: e.on_hand_after,
            reference: e.reference,
            note: e.note,
            occurred_at: e.occurred_at,
        });
        self.store.upsert(e.tenant_id, e.product_id, rm);

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::test_support::Feed;
    use crate::read_model::InMemoryTenantStore;
    use chrono::TimeZone;
    use retailpos_catalog::{ProductStatus, ReferenceId};
    use retailpos_core::{AggregateId, Money};
    use retailpos_inventory::MovementRecorded;
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()
    }

    fn movement(
        tenant_id: TenantId,
        product_id: ProductId,
        kind: MovementKind,
        quantity: i64,
        on_hand_after: i64,
    ) -> StockEvent {
        StockEvent::MovementRecorded(MovementRecorded {
            tenant_id,
            product_id,
            kind,
            quantity,
            on_hand_after,
            reference: None,
            note: None,
            occurred_at: test_time(),
        })
    }

    fn product(product_id: ProductId, name: &str, reorder_level: i64) -> ProductReadModel {
        ProductReadModel {
            product_id,
            code: name.to_uppercase(),
            name: name.to_string(),
            category_id: ReferenceId::new(AggregateId::new()),
            unit_id: ReferenceId::new(AggregateId::new()),
            cost_price: Money::from_minor(100),
            sale_price: Money::from_minor(150),
            reorder_level,
            description: None,
            status: ProductStatus::Active,
            updated_at: test_time(),
        }
    }

    #[test]
    fn movements_track_on_hand_and_history() {
        let projection = StockProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let rice = ProductId::new(AggregateId::new());

        for (kind, qty, after) in [
            (MovementKind::Opening, 20, 20),
            (MovementKind::Sale, -3, 17),
            (MovementKind::Adjustment, -2, 15),
        ] {
            let env = feed.envelope(tenant, rice.0, AGGREGATE_TYPE, &movement(tenant, rice, kind, qty, after));
            projection.apply_envelope(&env).unwrap();
        }

        let rm = projection.get(tenant, &rice).unwrap();
        assert_eq!(rm.on_hand, 15);
        assert_eq!(rm.movements.len(), 3);
        assert_eq!(rm.movements[1].kind, MovementKind::Sale);
        assert_eq!(projection.on_hand(test_tenant_id(), &rice), 0);
    }

    #[test]
    fn redelivered_movement_is_not_counted_twice() {
        let projection = StockProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let id = ProductId::new(AggregateId::new());
        let env = feed.envelope(
            tenant,
            id.0,
            AGGREGATE_TYPE,
            &movement(tenant, id, MovementKind::Opening, 5, 5),
        );
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();
        assert_eq!(projection.get(tenant, &id).unwrap().movements.len(), 1);
    }

    #[test]
    fn low_stock_joins_reorder_levels() {
        let projection = StockProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sugar = ProductId::new(AggregateId::new());
        let salt = ProductId::new(AggregateId::new());
        let flour = ProductId::new(AggregateId::new());

        for (id, qty) in [(sugar, 3), (salt, 40)] {
            let env = feed.envelope(tenant, id.0, AGGREGATE_TYPE, &movement(tenant, id, MovementKind::Opening, qty, qty));
            projection.apply_envelope(&env).unwrap();
        }

        let mut archived = product(ProductId::new(AggregateId::new()), "old", 10);
        archived.status = ProductStatus::Archived;
        let products = vec![
            product(sugar, "sugar", 5),
            product(salt, "salt", 5),
            product(flour, "flour", 2),
            archived,
        ];

        let low = projection.low_stock(tenant, &products);
        let names: Vec<_> = low.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["flour", "sugar"]);
        assert_eq!(low[0].on_hand, 0);
    }
}
