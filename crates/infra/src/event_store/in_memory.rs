use std::collections::HashMap;
use std::sync::RwLock;

use retailpos_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, validate_batch};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Inner {
    /// Positions into `log`, per stream, in sequence order.
    streams: HashMap<StreamKey, Vec<usize>>,
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events across every stream.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        validate_batch(&events)?;

        let key = StreamKey {
            tenant_id: events[0].tenant_id,
            aggregate_id: events[0].aggregate_id,
        };
        let aggregate_type = events[0].aggregate_type.clone();

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        let Inner { streams, log } = &mut *inner;

        let positions = streams.entry(key).or_default();
        let current = positions.last().map(|&p| log[p].sequence_number).unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(&first) = positions.first() {
            if log[first].aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    log[first].aggregate_type, aggregate_type
                )));
            }
        }

        let mut committed = Vec::with_capacity(events.len());
        for (offset, e) in events.into_iter().enumerate() {
            let stored = StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: current + 1 + offset as u64,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            positions.push(log.len());
            log.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner
            .streams
            .get(&key)
            .map(|positions| positions.iter().map(|&p| inner.log[p].clone()).collect())
            .unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(inner.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "inventory.stock.movement_recorded".to_string(),
            event_version: 1,
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            payload: json!({ "quantity": 5 }),
        }
    }

    #[test]
    fn sequence_numbers_start_at_one_and_grow_per_stream() {
        let store = InMemoryEventStore::new();
        let tenant = test_tenant_id();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let first = store
            .append(
                vec![event(tenant, a, "inventory.stock"), event(tenant, a, "inventory.stock")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(
            first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let other = store
            .append(vec![event(tenant, b, "inventory.stock")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(other[0].sequence_number, 1);

        let third = store
            .append(vec![event(tenant, a, "inventory.stock")], ExpectedVersion::Exact(2))
            .unwrap();
        assert_eq!(third[0].sequence_number, 3);

        assert_eq!(store.load_stream(tenant, a).unwrap().len(), 3);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let tenant = test_tenant_id();
        let a = AggregateId::new();
        store
            .append(vec![event(tenant, a, "sales.sale")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![event(tenant, a, "sales.sale")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();

        let err = store
            .append(
                vec![event(test_tenant_id(), a, "sales.sale"), event(test_tenant_id(), a, "sales.sale")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));

        let tenant = test_tenant_id();
        let err = store
            .append(
                vec![event(tenant, a, "sales.sale"), event(tenant, a, "purchasing.purchase")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn aggregate_type_is_fixed_by_the_first_append() {
        let store = InMemoryEventStore::new();
        let tenant = test_tenant_id();
        let a = AggregateId::new();
        store
            .append(vec![event(tenant, a, "hr.employee")], ExpectedVersion::Any)
            .unwrap();
        let err = store
            .append(vec![event(tenant, a, "hr.attendance")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[test]
    fn streams_are_tenant_isolated() {
        let store = InMemoryEventStore::new();
        let shop_a = test_tenant_id();
        let shop_b = test_tenant_id();
        let id = AggregateId::new();
        store
            .append(vec![event(shop_a, id, "catalog.product")], ExpectedVersion::Exact(0))
            .unwrap();

        assert!(store.load_stream(shop_b, id).unwrap().is_empty());
        assert_eq!(store.load_stream(shop_a, id).unwrap().len(), 1);
    }

    #[test]
    fn load_all_keeps_commit_order_across_streams() {
        let store = InMemoryEventStore::new();
        let tenant = test_tenant_id();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store.append(vec![event(tenant, a, "sales.sale")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(tenant, b, "sales.sale")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(tenant, a, "sales.sale")], ExpectedVersion::Any).unwrap();

        let order: Vec<_> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|e| (e.aggregate_id, e.sequence_number))
            .collect();
        assert_eq!(order, vec![(a, 1), (b, 1), (a, 2)]);
    }
}
