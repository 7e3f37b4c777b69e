//! Read models built from the event stream.
//!
//! Every projection is tenant partitioned, tolerates redelivery (a per-stream cursor
//! drops events it has already applied) and can be rebuilt from scratch. A sequence gap
//! is reported instead of silently applied.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use retailpos_core::{AggregateId, TenantId};
use retailpos_events::EventEnvelope;

pub mod attendance;
pub mod employees;
pub mod parties;
pub mod products;
pub mod purchases;
pub mod references;
pub mod salary_cycles;
pub mod sales;
pub mod stock;
pub mod users;

pub use attendance::{AttendanceProjection, AttendanceReadModel};
pub use employees::{EmployeeReadModel, EmployeesProjection};
pub use parties::{PartiesProjection, PartyReadModel};
pub use products::{ProductCatalogProjection, ProductReadModel};
pub use purchases::{PurchaseReadModel, PurchasesProjection};
pub use references::{ReferenceReadModel, ReferencesProjection};
pub use salary_cycles::{SalaryCycleReadModel, SalaryCyclesProjection};
pub use sales::{SaleReadModel, SalesProjection};
pub use stock::{StockProjection, StockReadModel};
pub use users::{UserReadModel, UsersProjection};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model fed from bus envelopes.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply one envelope. Envelopes of aggregate types the projection does not follow are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Forget every record and cursor of a tenant.
    fn clear_tenant(&self, tenant_id: TenantId);

    /// Clear the tenants present in `envelopes`, then re-apply them in the given order.
    ///
    /// The order must keep each stream's sequence order (commit order does).
    fn rebuild_from_scratch(&self, envelopes: &[EventEnvelope<JsonValue>]) -> Result<(), ProjectionError> {
        let mut tenants: Vec<TenantId> = envelopes.iter().map(|e| e.tenant_id()).collect();
        tenants.sort();
        tenants.dedup();
        for tenant in tenants {
            self.clear_tenant(tenant);
        }
        for env in envelopes {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

/// Last applied sequence number per `(tenant, stream)`.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// `Ok(true)` when the envelope is next in its stream, `Ok(false)` for a redelivery.
    ///
    /// A projection that first meets a stream mid-way accepts whatever comes first.
    pub fn should_apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let last = self.get(envelope.tenant_id(), envelope.aggregate_id());
        let found = envelope.sequence_number();
        if found == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        if found <= last {
            return Ok(false);
        }
        if last != 0 && found != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(
                (envelope.tenant_id(), envelope.aggregate_id()),
                envelope.sequence_number(),
            );
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

/// The payload must describe the same tenant and stream as its envelope.
pub(crate) fn ensure_scope(
    envelope: &EventEnvelope<JsonValue>,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
) -> Result<(), ProjectionError> {
    if tenant_id != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if aggregate_id != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, aggregate_id, "sales.sale", seq, JsonValue::Null)
    }

    #[test]
    fn cursors_skip_redelivery_and_reject_gaps() {
        let cursors = StreamCursors::new();
        let tenant = TenantId::new();
        let id = AggregateId::new();

        let first = envelope(tenant, id, 1);
        assert!(cursors.should_apply(&first).unwrap());
        cursors.advance(&first);

        assert!(!cursors.should_apply(&first).unwrap());
        assert!(cursors.should_apply(&envelope(tenant, id, 2)).unwrap());
        assert_eq!(
            cursors.should_apply(&envelope(tenant, id, 4)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        );
        assert!(cursors.should_apply(&envelope(tenant, id, 0)).is_err());
    }

    #[test]
    fn cursors_are_per_tenant() {
        let cursors = StreamCursors::new();
        let shop_a = TenantId::new();
        let shop_b = TenantId::new();
        let id = AggregateId::new();
        cursors.advance(&envelope(shop_a, id, 3));

        assert_eq!(cursors.get(shop_b, id), 0);
        cursors.clear_tenant(shop_a);
        assert_eq!(cursors.get(shop_a, id), 0);
    }
}
