//! Keeps stock ledgers in step with sales and purchases.
//!
//! `SaleCompleted` takes every line out of stock, `PurchaseReceived` puts every line in.
//! The movement reference is the document id.

use serde_json::Value as JsonValue;
use tracing::debug;

use retailpos_events::{EventBus, EventEnvelope};
use retailpos_inventory::{MovementKind, RecordMovement, StockCommand, StockItem};
use retailpos_purchasing::PurchaseEvent;
use retailpos_sales::SaleEvent;

use super::{ProcessError, ProcessManager, with_concurrency_retry};
use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::decode;

/// Stock movements owed for one envelope; empty for anything that moves no goods.
pub fn instructions_for(envelope: &EventEnvelope<JsonValue>) -> Result<Vec<RecordMovement>, ProcessError> {
    match envelope.aggregate_type() {
        retailpos_sales::sale::AGGREGATE_TYPE => match decode::<SaleEvent>(envelope)? {
            SaleEvent::Completed(e) => {
                let reference = e.sale_id.to_string();
                Ok(e.lines
                    .iter()
                    .map(|line| RecordMovement {
                        tenant_id: e.tenant_id,
                        product_id: line.product_id,
                        kind: MovementKind::Sale,
                        quantity: -line.quantity,
                        reference: Some(reference.clone()),
                        note: Some(e.invoice_no.clone()),
                        occurred_at: e.occurred_at,
                    })
                    .collect())
            }
            _ => Ok(vec![]),
        },
        retailpos_purchasing::purchase::AGGREGATE_TYPE => match decode::<PurchaseEvent>(envelope)? {
            PurchaseEvent::Received(e) => {
                let reference = e.purchase_id.to_string();
                Ok(e.lines
                    .iter()
                    .map(|line| RecordMovement {
                        tenant_id: e.tenant_id,
                        product_id: line.product_id,
                        kind: MovementKind::Purchase,
                        quantity: line.quantity,
                        reference: Some(reference.clone()),
                        note: None,
                        occurred_at: e.occurred_at,
                    })
                    .collect())
            }
            _ => Ok(vec![]),
        },
        _ => Ok(vec![]),
    }
}

pub struct StockSync<S, B> {
    dispatcher: std::sync::Arc<CommandDispatcher<S, B>>,
}

impl<S, B> StockSync<S, B> {
    pub fn new(dispatcher: std::sync::Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> ProcessManager for StockSync<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "stock_sync"
    }

    fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<usize, ProcessError> {
        let mut committed = 0;
        for movement in instructions_for(envelope)? {
            let product_id = movement.product_id;
            let events = with_concurrency_retry(|| {
                self.dispatcher.dispatch(
                    movement.tenant_id,
                    product_id.0,
                    retailpos_inventory::stock::AGGREGATE_TYPE,
                    StockCommand::RecordMovement(movement.clone()),
                    |_, _| StockItem::empty(product_id),
                )
            })?;
            if events.is_empty() {
                debug!(product_id = %product_id, "stock movement already applied");
            } else {
                committed += 1;
            }
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use crate::projections::test_support::Feed;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use retailpos_catalog::ProductId;
    use retailpos_core::{AggregateId, Discount, Money, TenantId, Totals, UserId};
    use retailpos_events::InMemoryEventBus;
    use retailpos_parties::{CustomerRef, PartyId};
    use retailpos_purchasing::{PurchaseId, PurchaseLine, PurchaseReceived};
    use retailpos_sales::{CartLine, PaymentMethod, SaleCompleted, SaleId, invoice_number};
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 13, 0, 0).unwrap()
    }

    fn sale_completed(tenant_id: TenantId, sale_id: SaleId, product_id: ProductId, quantity: i64) -> SaleEvent {
        let lines = vec![CartLine {
            product_id,
            code: "SOAP".into(),
            name: "Soap".into(),
            quantity,
            unit_price: Money::from_minor(120),
            cost_price: Money::from_minor(80),
        }];
        SaleEvent::Completed(SaleCompleted {
            tenant_id,
            sale_id,
            invoice_no: invoice_number(sale_id),
            cashier: UserId::new(),
            customer: CustomerRef::WalkIn,
            lines,
            discount: Discount::None,
            totals: Totals::compute(Money::from_minor(120 * quantity), &Discount::None, Money::from_minor(120 * quantity)),
            cost_total: Money::from_minor(80 * quantity),
            method: PaymentMethod::Cash,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn completed_sale_becomes_negative_movements() {
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sale = SaleId::new(AggregateId::new());
        let soap = ProductId::new(AggregateId::new());
        let env = feed.envelope(tenant, sale.0, retailpos_sales::sale::AGGREGATE_TYPE, &sale_completed(tenant, sale, soap, 4));

        let movements = instructions_for(&env).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Sale);
        assert_eq!(movements[0].quantity, -4);
        assert_eq!(movements[0].reference.as_deref(), Some(sale.to_string().as_str()));
    }

    #[test]
    fn received_purchase_becomes_positive_movements() {
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let purchase = PurchaseId::new(AggregateId::new());
        let lines: Vec<PurchaseLine> = (1..=2)
            .map(|q| PurchaseLine {
                product_id: ProductId::new(AggregateId::new()),
                product_name: format!("Item {q}"),
                quantity: q * 10,
                unit_cost: Money::from_minor(50),
            })
            .collect();
        let ev = PurchaseEvent::Received(PurchaseReceived {
            tenant_id: tenant,
            purchase_id: purchase,
            supplier_id: PartyId::new(AggregateId::new()),
            purchase_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            lines,
            discount: Discount::None,
            totals: Totals::compute(Money::from_minor(1_500), &Discount::None, Money::ZERO),
            received_by: UserId::new(),
            occurred_at: test_time(),
        });
        let env = feed.envelope(tenant, purchase.0, retailpos_purchasing::purchase::AGGREGATE_TYPE, &ev);

        let quantities: Vec<i64> = instructions_for(&env).unwrap().iter().map(|m| m.quantity).collect();
        assert_eq!(quantities, vec![10, 20]);
    }

    #[test]
    fn redelivered_sale_moves_stock_once() {
        let dispatcher = Arc::new(CommandDispatcher::new(
            InMemoryEventStore::new(),
            InMemoryEventBus::<EventEnvelope<JsonValue>>::new(),
        ));
        let sync = StockSync::new(dispatcher.clone());
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sale = SaleId::new(AggregateId::new());
        let soap = ProductId::new(AggregateId::new());
        let env = feed.envelope(tenant, sale.0, retailpos_sales::sale::AGGREGATE_TYPE, &sale_completed(tenant, sale, soap, 2));

        assert_eq!(sync.handle(&env).unwrap(), 1);
        assert_eq!(sync.handle(&env).unwrap(), 0);

        let (item, _) = dispatcher
            .load::<StockItem>(tenant, soap.0, |_, _| StockItem::empty(soap))
            .unwrap();
        assert_eq!(item.on_hand(), -2);
    }

    #[test]
    fn other_events_are_ignored() {
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let sale = SaleId::new(AggregateId::new());
        let opened = SaleEvent::Opened {
            tenant_id: tenant,
            sale_id: sale,
            cashier: UserId::new(),
            customer: CustomerRef::WalkIn,
            occurred_at: test_time(),
        };
        let env = feed.envelope(tenant, sale.0, retailpos_sales::sale::AGGREGATE_TYPE, &opened);
        assert!(instructions_for(&env).unwrap().is_empty());
    }
}
