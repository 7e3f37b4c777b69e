use serde::{Deserialize, Serialize};
use uuid::Uuid;

use retailpos_core::{AggregateId, TenantId};

/// A stored event together with the stream it belongs to.
///
/// `sequence_number` starts at 1 and grows by one per stream; consumers use it to
/// drop redeliveries and to detect gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Same stream metadata, different payload (e.g. typed event → JSON for the bus).
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_payload_keeps_stream_metadata() {
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let env = EventEnvelope::new(Uuid::now_v7(), tenant, agg, "sales.sale", 7, 41u32);
        let id = env.event_id();

        let mapped = env.map_payload(|n| serde_json::json!({ "n": n + 1 }));

        assert_eq!(mapped.event_id(), id);
        assert_eq!(mapped.tenant_id(), tenant);
        assert_eq!(mapped.aggregate_id(), agg);
        assert_eq!(mapped.aggregate_type(), "sales.sale");
        assert_eq!(mapped.sequence_number(), 7);
        assert_eq!(mapped.payload()["n"], 42);
    }
}
