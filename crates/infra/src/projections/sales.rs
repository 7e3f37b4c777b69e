//! Sales as the till and the back office see them, including held invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{Discount, Money, Searchable, TenantId, Totals, UserId};
use retailpos_events::{Event, EventEnvelope};
use retailpos_parties::CustomerRef;
use retailpos_sales::sale::AGGREGATE_TYPE;
use retailpos_sales::{CartLine, PaymentMethod, SaleEvent, SaleId, SaleStatus, cart_totals, cost_total, invoice_number};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalePaymentRow {
    pub amount: Money,
    pub method: PaymentMethod,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleReadModel {
    pub sale_id: SaleId,
    pub invoice_no: String,
    pub cashier: UserId,
    pub customer: CustomerRef,
    pub lines: Vec<CartLine>,
    pub discount: Discount,
    pub status: SaleStatus,
    /// Running cart totals while open or held; final totals once completed.
    pub totals: Totals,
    pub cost_total: Money,
    pub method: Option<PaymentMethod>,
    pub payments: Vec<SalePaymentRow>,
    /// Due after later payments.
    pub outstanding: Money,
    pub hold_note: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SaleReadModel {
    fn refresh_cart(&mut self) {
        self.totals = cart_totals(&self.lines, &self.discount, Money::ZERO);
        self.cost_total = cost_total(&self.lines);
    }

    /// Σ later payments.
    pub fn payments_total(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn completed_on(&self) -> Option<NaiveDate> {
        self.completed_at.map(|t| t.date_naive())
    }
}

impl Searchable for SaleReadModel {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.invoice_no.as_str()];
        fields.extend(self.lines.iter().map(|l| l.name.as_str()));
        fields
    }
}

#[derive(Debug)]
pub struct SalesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesProjection<S>
where
    S: TenantStore<SaleId, SaleReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, sale_id: &SaleId) -> Option<SaleReadModel> {
        self.store.get(tenant_id, sale_id)
    }

    /// Newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<SaleReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        rows
    }

    /// Held invoices keyed to `cashier`, most recently held first.
    pub fn held_for(&self, tenant_id: TenantId, cashier: UserId) -> Vec<SaleReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|s| s.status == SaleStatus::Held && s.cashier == cashier)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows
    }

    /// Completed sales whose completion date falls in `[from, to]`, oldest first.
    pub fn completed_between(&self, tenant_id: TenantId, from: NaiveDate, to: NaiveDate) -> Vec<SaleReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|s| s.status == SaleStatus::Completed)
            .filter(|s| s.completed_on().is_some_and(|d| d >= from && d <= to))
            .collect();
        rows.sort_by_key(|s| s.completed_at);
        rows
    }

    pub fn completed(&self, tenant_id: TenantId) -> Vec<SaleReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|s| s.status == SaleStatus::Completed)
            .collect()
    }

    fn update(&self, tenant_id: TenantId, sale_id: SaleId, at: DateTime<Utc>, f: impl FnOnce(&mut SaleReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &sale_id) {
            f(&mut rm);
            rm.updated_at = at;
            self.store.upsert(tenant_id, sale_id, rm);
        }
    }
}

impl<S> Projection for SalesProjection<S>
where
    S: TenantStore<SaleId, SaleReadModel>,
{
    fn name(&self) -> &'static str {
        "sales.sales"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: SaleEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let sale_id = ev.sale_id();
        ensure_scope(envelope, tenant_id, sale_id.0)?;
        let at = ev.occurred_at();

        match ev {
            SaleEvent::Opened { cashier, customer, .. } => {
                self.store.upsert(
                    tenant_id,
                    sale_id,
                    SaleReadModel {
                        sale_id,
                        invoice_no: invoice_number(sale_id),
                        cashier,
                        customer,
                        lines: Vec::new(),
                        discount: Discount::None,
                        status: SaleStatus::Open,
                        totals: Totals::default(),
                        cost_total: Money::ZERO,
                        method: None,
                        payments: Vec::new(),
                        outstanding: Money::ZERO,
                        hold_note: None,
                        opened_at: at,
                        completed_at: None,
                        updated_at: at,
                    },
                );
            }
            SaleEvent::ItemAdded { line, .. } => self.update(tenant_id, sale_id, at, |rm| {
                rm.lines.push(line);
                rm.refresh_cart();
            }),
            SaleEvent::QuantityChanged {
                product_id, quantity, ..
            } => self.update(tenant_id, sale_id, at, |rm| {
                if let Some(line) = rm.lines.iter_mut().find(|l| l.product_id == product_id) {
                    line.quantity = quantity;
                }
                rm.refresh_cart();
            }),
            SaleEvent::ItemRemoved { product_id, .. } => self.update(tenant_id, sale_id, at, |rm| {
                rm.lines.retain(|l| l.product_id != product_id);
                rm.refresh_cart();
            }),
            SaleEvent::DiscountSet { discount, .. } => self.update(tenant_id, sale_id, at, |rm| {
                rm.discount = discount;
                rm.refresh_cart();
            }),
            SaleEvent::CustomerSet { customer, .. } => {
                self.update(tenant_id, sale_id, at, |rm| rm.customer = customer)
            }
            SaleEvent::Held { cashier, note, .. } => self.update(tenant_id, sale_id, at, |rm| {
                rm.cashier = cashier;
                rm.hold_note = note;
                rm.status = SaleStatus::Held;
            }),
            SaleEvent::Resumed { .. } => self.update(tenant_id, sale_id, at, |rm| {
                rm.hold_note = None;
                rm.status = SaleStatus::Open;
            }),
            SaleEvent::Completed(e) => self.update(tenant_id, sale_id, at, |rm| {
                rm.invoice_no = e.invoice_no;
                rm.customer = e.customer;
                rm.lines = e.lines;
                rm.discount = e.discount;
                rm.totals = e.totals;
                rm.cost_total = e.cost_total;
                rm.method = Some(e.method);
                rm.outstanding = e.totals.due;
                rm.status = SaleStatus::Completed;
                rm.completed_at = Some(at);
            }),
            SaleEvent::PaymentReceived {
                amount,
                method,
                received_by,
                outstanding_after,
                ..
            } => self.update(tenant_id, sale_id, at, |rm| {
                rm.payments.push(SalePaymentRow {
                    amount,
                    method,
                    received_by,
                    occurred_at: at,
                });
                rm.outstanding = outstanding_after;
            }),
            SaleEvent::Cancelled { .. } => {
                self.update(tenant_id, sale_id, at, |rm| rm.status = SaleStatus::Cancelled)
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
    use retailpos_sales::SaleCompleted;
    use std::sync::Arc;

    type TestProjection = SalesProjection<Arc<InMemoryTenantStore<SaleId, SaleReadModel>>>;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap()
    }

    fn line(price: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(AggregateId::new()),
            code: "P-1".into(),
            name: "Biscuits".into(),
            quantity,
            unit_price: Money::from_minor(price),
            cost_price: Money::from_minor(price / 2),
        }
    }

    fn apply(projection: &TestProjection, feed: &mut Feed, tenant: TenantId, sale: SaleId, ev: SaleEvent) {
        projection
            .apply_envelope(&feed.envelope(tenant, sale.0, AGGREGATE_TYPE, &ev))
            .unwrap();
    }

    fn opened(tenant_id: TenantId, sale_id: SaleId, cashier: UserId) -> SaleEvent {
        SaleEvent::Opened {
            tenant_id,
            sale_id,
            cashier,
            customer: CustomerRef::WalkIn,
            occurred_at: test_time(),
        }
    }

    #[test]
    fn cart_totals_follow_edits() {
        let projection = SalesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sale = SaleId::new(AggregateId::new());
        let biscuits = line(200, 1);
        let product_id = biscuits.product_id;

        apply(&projection, &mut feed, tenant, sale, opened(tenant, sale, UserId::new()));
        apply(&projection, &mut feed, tenant, sale, SaleEvent::ItemAdded {
            tenant_id: tenant,
            sale_id: sale,
            line: biscuits,
            occurred_at: test_time(),
        });
        apply(&projection, &mut feed, tenant, sale, SaleEvent::QuantityChanged {
            tenant_id: tenant,
            sale_id: sale,
            product_id,
            quantity: 3,
            occurred_at: test_time(),
        });
        apply(&projection, &mut feed, tenant, sale, SaleEvent::DiscountSet {
            tenant_id: tenant,
            sale_id: sale,
            discount: Discount::Flat(Money::from_minor(100)),
            occurred_at: test_time(),
        });

        let rm = projection.get(tenant, &sale).unwrap();
        assert_eq!(rm.totals.subtotal, Money::from_minor(600));
        assert_eq!(rm.totals.total, Money::from_minor(500));
        assert_eq!(rm.cost_total, Money::from_minor(300));
        assert!(rm.invoice_no.starts_with("INV-"));
    }

    #[test]
    fn held_invoices_are_listed_per_cashier() {
        let projection = SalesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let alice = UserId::new();
        let bob = UserId::new();

        for cashier in [alice, alice, bob] {
            let sale = SaleId::new(AggregateId::new());
            apply(&projection, &mut feed, tenant, sale, opened(tenant, sale, cashier));
            apply(&projection, &mut feed, tenant, sale, SaleEvent::Held {
                tenant_id: tenant,
                sale_id: sale,
                cashier,
                note: Some("customer went to the car".into()),
                occurred_at: test_time(),
            });
        }

        assert_eq!(projection.held_for(tenant, alice).len(), 2);
        assert_eq!(projection.held_for(tenant, bob).len(), 1);

        let resumed = projection.held_for(tenant, bob)[0].sale_id;
        apply(&projection, &mut feed, tenant, resumed, SaleEvent::Resumed {
            tenant_id: tenant,
            sale_id: resumed,
            cashier: bob,
            occurred_at: test_time(),
        });
        assert!(projection.held_for(tenant, bob).is_empty());
        assert_eq!(projection.get(tenant, &resumed).unwrap().status, SaleStatus::Open);
    }

    #[test]
    fn completion_and_later_payment() {
        let projection = SalesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sale = SaleId::new(AggregateId::new());
        let cashier = UserId::new();
        let lines = vec![line(1_000, 2)];
        let totals = cart_totals(&lines, &Discount::None, Money::from_minor(1_500));

        apply(&projection, &mut feed, tenant, sale, opened(tenant, sale, cashier));
        apply(&projection, &mut feed, tenant, sale, SaleEvent::Completed(SaleCompleted {
            tenant_id: tenant,
            sale_id: sale,
            invoice_no: invoice_number(sale),
            cashier,
            customer: CustomerRef::WalkIn,
            lines: lines.clone(),
            discount: Discount::None,
            totals,
            cost_total: cost_total(&lines),
            method: PaymentMethod::Cash,
            occurred_at: test_time(),
        }));
        apply(&projection, &mut feed, tenant, sale, SaleEvent::PaymentReceived {
            tenant_id: tenant,
            sale_id: sale,
            amount: Money::from_minor(300),
            method: PaymentMethod::Mobile,
            received_by: cashier,
            outstanding_after: Money::from_minor(200),
            occurred_at: test_time(),
        });

        let rm = projection.get(tenant, &sale).unwrap();
        assert_eq!(rm.status, SaleStatus::Completed);
        assert_eq!(rm.outstanding, Money::from_minor(200));
        assert_eq!(rm.payments_total(), Money::from_minor(300));

        let day = test_time().date_naive();
        assert_eq!(projection.completed_between(tenant, day, day).len(), 1);
        assert!(projection.completed_between(tenant, day.succ_opt().unwrap(), day.succ_opt().unwrap()).is_empty());
    }
}
