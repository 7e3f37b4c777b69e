use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{Discount, Money, Searchable, TenantId, Totals, UserId};
use retailpos_events::{Event, EventEnvelope};
use retailpos_parties::PartyId;
use retailpos_purchasing::purchase::AGGREGATE_TYPE;
use retailpos_purchasing::{PurchaseEvent, PurchaseId, PurchaseLine, PurchaseStatus};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchasePaymentRow {
    pub amount: Money,
    pub paid_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReadModel {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub supplier_reference: Option<String>,
    pub purchase_date: NaiveDate,
    pub lines: Vec<PurchaseLine>,
    pub discount: Discount,
    pub status: PurchaseStatus,
    pub totals: Totals,
    pub payments: Vec<PurchasePaymentRow>,
    pub outstanding: Money,
    pub created_by: UserId,
    pub received_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseReadModel {
    fn refresh_draft(&mut self) {
        let subtotal = self.lines.iter().map(PurchaseLine::line_total).sum();
        self.totals = Totals::compute(subtotal, &self.discount, Money::ZERO);
    }

    pub fn payments_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }
}

impl Searchable for PurchaseReadModel {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.supplier_reference.as_deref().into_iter().collect();
        fields.extend(self.lines.iter().map(|l| l.product_name.as_str()));
        fields
    }
}

#[derive(Debug)]
pub struct PurchasesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> PurchasesProjection<S>
where
    S: TenantStore<PurchaseId, PurchaseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, purchase_id: &PurchaseId) -> Option<PurchaseReadModel> {
        self.store.get(tenant_id, purchase_id)
    }

    /// Latest purchase date first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<PurchaseReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| {
            b.purchase_date
                .cmp(&a.purchase_date)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        rows
    }

    /// Received purchases dated within `[from, to]`.
    pub fn received_between(&self, tenant_id: TenantId, from: NaiveDate, to: NaiveDate) -> Vec<PurchaseReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.status == PurchaseStatus::Received && p.purchase_date >= from && p.purchase_date <= to)
            .collect();
        rows.sort_by_key(|p| p.purchase_date);
        rows
    }

    pub fn received(&self, tenant_id: TenantId) -> Vec<PurchaseReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.status == PurchaseStatus::Received)
            .collect()
    }

    fn update(&self, tenant_id: TenantId, id: PurchaseId, at: DateTime<Utc>, f: impl FnOnce(&mut PurchaseReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &id) {
            f(&mut rm);
            rm.updated_at = at;
            self.store.upsert(tenant_id, id, rm);
        }
    }
}

impl<S> Projection for PurchasesProjection<S>
where
    S: TenantStore<PurchaseId, PurchaseReadModel>,
{
    fn name(&self) -> &'static str {
        "purchasing.purchases"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: PurchaseEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let purchase_id = ev.purchase_id();
        ensure_scope(envelope, tenant_id, purchase_id.0)?;
        let at = ev.occurred_at();

        match ev {
            PurchaseEvent::Created {
                supplier_id,
                supplier_reference,
                purchase_date,
                created_by,
                ..
            } => {
                self.store.upsert(
                    tenant_id,
                    purchase_id,
                    PurchaseReadModel {
                        purchase_id,
                        supplier_id,
                        supplier_reference,
                        purchase_date,
                        lines: Vec::new(),
                        discount: Discount::None,
                        status: PurchaseStatus::Draft,
                        totals: Totals::default(),
                        payments: Vec::new(),
                        outstanding: Money::ZERO,
                        created_by,
                        received_at: None,
                        updated_at: at,
                    },
                );
            }
            PurchaseEvent::LineAdded {
                product_id,
                product_name,
                quantity,
                unit_cost,
                ..
            } => self.update(tenant_id, purchase_id, at, |rm| {
                match rm.lines.iter_mut().find(|l| l.product_id == product_id) {
                    Some(line) => {
                        line.quantity += quantity;
                        line.unit_cost = unit_cost;
                    }
                    None => rm.lines.push(PurchaseLine {
                        product_id,
                        product_name,
                        quantity,
                        unit_cost,
                    }),
                }
                rm.refresh_draft();
            }),
            PurchaseEvent::LineRemoved { product_id, .. } => self.update(tenant_id, purchase_id, at, |rm| {
                rm.lines.retain(|l| l.product_id != product_id);
                rm.refresh_draft();
            }),
            PurchaseEvent::DiscountSet { discount, .. } => self.update(tenant_id, purchase_id, at, |rm| {
                rm.discount = discount;
                rm.refresh_draft();
            }),
            PurchaseEvent::Received(e) => self.update(tenant_id, purchase_id, at, |rm| {
                rm.lines = e.lines;
                rm.discount = e.discount;
                rm.totals = e.totals;
                rm.outstanding = e.totals.due;
                rm.status = PurchaseStatus::Received;
                rm.received_at = Some(at);
            }),
            PurchaseEvent::PaymentMade {
                amount,
                paid_by,
                outstanding_after,
                ..
            } => self.update(tenant_id, purchase_id, at, |rm| {
                rm.payments.push(PurchasePaymentRow {
                    amount,
                    paid_by,
                    occurred_at: at,
                });
                rm.outstanding = outstanding_after;
            }),
            PurchaseEvent::Cancelled { .. } => {
                self.update(tenant_id, purchase_id, at, |rm| rm.status = PurchaseStatus::Cancelled)
            }
        }

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
    use retailpos_catalog::ProductId;
    use retailpos_core::AggregateId;
    use retailpos_purchasing::PurchaseReceived;
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 14, 15, 0, 0).unwrap()
    }

    #[test]
    fn draft_lines_merge_and_receipt_opens_payable() {
        let projection = PurchasesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let purchase = PurchaseId::new(AggregateId::new());
        let supplier = PartyId::new(AggregateId::new());
        let flour = ProductId::new(AggregateId::new());
        let user = UserId::new();
        let date = NaiveDate::from_ymd_opt(2026, 9, 14).unwrap();

        let add = |quantity: i64, cost: i64| PurchaseEvent::LineAdded {
            tenant_id: tenant,
            purchase_id: purchase,
            product_id: flour,
            product_name: "Flour 1kg".into(),
            quantity,
            unit_cost: Money::from_minor(cost),
            occurred_at: test_time(),
        };
        let events = vec![
            PurchaseEvent::Created {
                tenant_id: tenant,
                purchase_id: purchase,
                supplier_id: supplier,
                supplier_reference: Some("BILL-77".into()),
                purchase_date: date,
                created_by: user,
                occurred_at: test_time(),
            },
            add(10, 90),
            add(5, 100),
        ];
        for ev in &events {
            projection
                .apply_envelope(&feed.envelope(tenant, purchase.0, AGGREGATE_TYPE, ev))
                .unwrap();
        }

        let draft = projection.get(tenant, &purchase).unwrap();
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].quantity, 15);
        assert_eq!(draft.totals.subtotal, Money::from_minor(1_500));

        let received = PurchaseEvent::Received(PurchaseReceived {
            tenant_id: tenant,
            purchase_id: purchase,
            supplier_id: supplier,
            purchase_date: date,
            lines: draft.lines.clone(),
            discount: Discount::None,
            totals: Totals::compute(Money::from_minor(1_500), &Discount::None, Money::from_minor(1_000)),
            received_by: user,
            occurred_at: test_time(),
        });
        projection
            .apply_envelope(&feed.envelope(tenant, purchase.0, AGGREGATE_TYPE, &received))
            .unwrap();

        let rm = projection.get(tenant, &purchase).unwrap();
        assert_eq!(rm.status, PurchaseStatus::Received);
        assert_eq!(rm.outstanding, Money::from_minor(500));
        assert_eq!(projection.received_between(tenant, date, date).len(), 1);
    }
}
