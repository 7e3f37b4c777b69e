//! Customers and suppliers with their running balances.
//!
//! Besides party streams this projection follows sales and purchases: every completed
//! sale to a registered customer and every received purchase is tracked as an open
//! document with its outstanding amount. A party's balance is its opening balance plus the
//! outstanding amounts of its documents, recomputed whenever either side changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{AggregateId, Money, Searchable, TenantId};
use retailpos_events::{Event, EventEnvelope};
use retailpos_parties::{PartyEvent, PartyId, PartyKind, PartyStatus};
use retailpos_purchasing::PurchaseEvent;
use retailpos_sales::SaleEvent;

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyReadModel {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub opening_balance: Money,
    pub status: PartyStatus,
    /// Customers: what they still owe the shop.
    pub due: Money,
    /// Suppliers: what the shop still owes them.
    pub payable: Money,
    pub updated_at: DateTime<Utc>,
}

impl Searchable for PartyReadModel {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.email.as_deref());
        fields.extend(self.phone.as_deref());
        fields
    }
}

/// A completed sale or received purchase that may still carry an outstanding amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyDocument {
    pub party_id: PartyId,
    pub outstanding: Money,
}

#[derive(Debug)]
pub struct PartiesProjection<S, D> {
    parties: S,
    documents: D,
    cursors: StreamCursors,
}

impl<S, D> PartiesProjection<S, D>
where
    S: TenantStore<PartyId, PartyReadModel>,
    D: TenantStore<AggregateId, PartyDocument>,
{
    pub fn new(parties: S, documents: D) -> Self {
        Self {
            parties,
            documents,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, party_id: &PartyId) -> Option<PartyReadModel> {
        self.parties.get(tenant_id, party_id)
    }

    /// Parties of one kind, by name.
    pub fn list(&self, tenant_id: TenantId, kind: PartyKind) -> Vec<PartyReadModel> {
        let mut rows: Vec<_> = self
            .parties
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.kind == kind)
            .collect();
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        rows
    }

    /// Σ customer dues.
    pub fn total_receivables(&self, tenant_id: TenantId) -> Money {
        self.list(tenant_id, PartyKind::Customer).iter().map(|p| p.due).sum()
    }

    /// Σ supplier payables.
    pub fn total_payables(&self, tenant_id: TenantId) -> Money {
        self.list(tenant_id, PartyKind::Supplier).iter().map(|p| p.payable).sum()
    }

    fn recompute(&self, tenant_id: TenantId, party_id: PartyId, at: DateTime<Utc>) {
        let Some(mut rm) = self.parties.get(tenant_id, &party_id) else {
            return;
        };
        let open: Money = self
            .documents
            .list(tenant_id)
            .iter()
            .filter(|d| d.party_id == party_id)
            .map(|d| d.outstanding)
            .sum();
        let balance = rm.opening_balance + open;
        match rm.kind {
            PartyKind::Customer => rm.due = balance,
            PartyKind::Supplier => rm.payable = balance,
        }
        rm.updated_at = rm.updated_at.max(at);
        self.parties.upsert(tenant_id, party_id, rm);
    }

    fn track_document(&self, tenant_id: TenantId, id: AggregateId, party_id: PartyId, outstanding: Money, at: DateTime<Utc>) {
        self.documents
            .upsert(tenant_id, id, PartyDocument { party_id, outstanding });
        self.recompute(tenant_id, party_id, at);
    }

    fn settle_document(&self, tenant_id: TenantId, id: AggregateId, outstanding: Money, at: DateTime<Utc>) {
        if let Some(doc) = self.documents.get(tenant_id, &id) {
            self.track_document(tenant_id, id, doc.party_id, outstanding, at);
        }
    }

    fn apply_party(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ev: PartyEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let party_id = ev.party_id();
        ensure_scope(envelope, tenant_id, party_id.0)?;
        let at = ev.occurred_at();

        match ev {
            PartyEvent::Registered(e) => {
                self.parties.upsert(
                    tenant_id,
                    party_id,
                    PartyReadModel {
                        party_id,
                        kind: e.kind,
                        name: e.name,
                        email: e.contact.email,
                        phone: e.contact.phone,
                        address: e.contact.address,
                        opening_balance: e.opening_balance,
                        status: PartyStatus::Active,
                        due: Money::ZERO,
                        payable: Money::ZERO,
                        updated_at: at,
                    },
                );
                // Documents may have been seen before the registration.
                self.recompute(tenant_id, party_id, at);
            }
            PartyEvent::Updated(e) => {
                if let Some(mut rm) = self.parties.get(tenant_id, &party_id) {
                    rm.name = e.name;
                    rm.email = e.contact.email;
                    rm.phone = e.contact.phone;
                    rm.address = e.contact.address;
                    rm.updated_at = at;
                    self.parties.upsert(tenant_id, party_id, rm);
                }
            }
            PartyEvent::Suspended(_) | PartyEvent::Reactivated(_) => {
                let status = if matches!(ev, PartyEvent::Suspended(_)) {
                    PartyStatus::Suspended
                } else {
                    PartyStatus::Active
                };
                if let Some(mut rm) = self.parties.get(tenant_id, &party_id) {
                    rm.status = status;
                    rm.updated_at = at;
                    self.parties.upsert(tenant_id, party_id, rm);
                }
            }
        }
        Ok(())
    }

    fn apply_sale(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ev: SaleEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        ensure_scope(envelope, tenant_id, ev.sale_id().0)?;
        let at = ev.occurred_at();

        match ev {
            SaleEvent::Completed(e) => {
                if let Some(party_id) = e.customer.party_id() {
                    self.track_document(tenant_id, e.sale_id.0, party_id, e.totals.due, at);
                }
            }
            SaleEvent::PaymentReceived {
                sale_id,
                outstanding_after,
                ..
            } => self.settle_document(tenant_id, sale_id.0, outstanding_after, at),
            _ => {}
        }
        Ok(())
    }

    fn apply_purchase(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let ev: PurchaseEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        ensure_scope(envelope, tenant_id, ev.purchase_id().0)?;
        let at = ev.occurred_at();

        match ev {
            PurchaseEvent::Received(e) => {
                self.track_document(tenant_id, e.purchase_id.0, e.supplier_id, e.totals.due, at)
            }
            PurchaseEvent::PaymentMade {
                purchase_id,
                outstanding_after,
                ..
            } => self.settle_document(tenant_id, purchase_id.0, outstanding_after, at),
            _ => {}
        }
        Ok(())
    }
}

impl<S, D> Projection for PartiesProjection<S, D>
where
    S: TenantStore<PartyId, PartyReadModel>,
    D: TenantStore<AggregateId, PartyDocument>,
{
    fn name(&self) -> &'static str {
        "parties.parties"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_type = envelope.aggregate_type();
        let followed = [
            retailpos_parties::party::AGGREGATE_TYPE,
            retailpos_sales::sale::AGGREGATE_TYPE,
            retailpos_purchasing::purchase::AGGREGATE_TYPE,
        ];
        if !followed.contains(&aggregate_type) || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        if aggregate_type == retailpos_parties::party::AGGREGATE_TYPE {
            self.apply_party(envelope)?;
        } else if aggregate_type == retailpos_sales::sale::AGGREGATE_TYPE {
            self.apply_sale(envelope)?;
        } else {
            self.apply_purchase(envelope)?;
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.parties.clear_tenant(tenant_id);
        self.documents.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
