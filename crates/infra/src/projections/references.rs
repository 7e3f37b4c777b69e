use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_catalog::reference::AGGREGATE_TYPE;
use retailpos_catalog::{ReferenceEvent, ReferenceId, ReferenceKind, ReferenceStatus};
use retailpos_core::{Searchable, TenantId};
use retailpos_events::{Event, EventEnvelope};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

/// A category or unit of measure as listed in the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceReadModel {
    pub reference_id: ReferenceId,
    pub kind: ReferenceKind,
    pub name: String,
    pub short_name: Option<String>,
    pub status: ReferenceStatus,
    pub updated_at: DateTime<Utc>,
}

impl Searchable for ReferenceReadModel {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.short_name.as_deref());
        fields
    }
}

#[derive(Debug)]
pub struct ReferencesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ReferencesProjection<S>
where
    S: TenantStore<ReferenceId, ReferenceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &ReferenceId) -> Option<ReferenceReadModel> {
        self.store.get(tenant_id, id)
    }

    /// Entries of one kind, by name.
    pub fn list(&self, tenant_id: TenantId, kind: ReferenceKind) -> Vec<ReferenceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect();
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        rows
    }

    fn set_status(&self, tenant_id: TenantId, id: ReferenceId, status: ReferenceStatus, at: DateTime<Utc>) {
        if let Some(mut rm) = self.store.get(tenant_id, &id) {
            rm.status = status;
            rm.updated_at = at;
            self.store.upsert(tenant_id, id, rm);
        }
    }

    /// True when `id` names an active entry of `kind`.
    pub fn is_active(&self, tenant_id: TenantId, id: &ReferenceId, kind: ReferenceKind) -> bool {
        self.get(tenant_id, id)
            .is_some_and(|r| r.kind == kind && r.status == ReferenceStatus::Active)
    }
}

impl<S> Projection for ReferencesProjection<S>
where
    S: TenantStore<ReferenceId, ReferenceReadModel>,
{
    fn name(&self) -> &'static str {
        "catalog.references"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: ReferenceEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let id = ev.reference_id();
        ensure_scope(envelope, tenant_id, id.0)?;
        let at = ev.occurred_at();

        match ev {
            ReferenceEvent::Created {
                kind, name, short_name, ..
            } => {
                self.store.upsert(
                    tenant_id,
                    id,
                    ReferenceReadModel {
                        reference_id: id,
                        kind,
                        name,
                        short_name,
                        status: ReferenceStatus::Active,
                        updated_at: at,
                    },
                );
            }
            ReferenceEvent::Renamed { name, short_name, .. } => {
                if let Some(mut rm) = self.store.get(tenant_id, &id) {
                    rm.name = name;
                    rm.short_name = short_name;
                    rm.updated_at = at;
                    self.store.upsert(tenant_id, id, rm);
                }
            }
            ReferenceEvent::Archived { .. } => self.set_status(tenant_id, id, ReferenceStatus::Archived, at),
            ReferenceEvent::Restored { .. } => self.set_status(tenant_id, id, ReferenceStatus::Active, at),
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
    use retailpos_core::AggregateId;
    use std::sync::Arc;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn created(tenant_id: TenantId, id: ReferenceId, kind: ReferenceKind, name: &str) -> ReferenceEvent {
        ReferenceEvent::Created {
            tenant_id,
            reference_id: id,
            kind,
            name: name.to_string(),
            short_name: (kind == ReferenceKind::Unit).then(|| "kg".to_string()),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn lists_by_kind_and_tracks_archival() {
        let projection = ReferencesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = TenantId::new();
        let drinks = ReferenceId::new(AggregateId::new());
        let bakery = ReferenceId::new(AggregateId::new());
        let kilo = ReferenceId::new(AggregateId::new());

        for (id, kind, name) in [
            (drinks, ReferenceKind::Category, "Drinks"),
            (bakery, ReferenceKind::Category, "bakery"),
            (kilo, ReferenceKind::Unit, "Kilogram"),
        ] {
            let env = feed.envelope(tenant, id.0, AGGREGATE_TYPE, &created(tenant, id, kind, name));
            projection.apply_envelope(&env).unwrap();
        }

        let names: Vec<_> = projection
            .list(tenant, ReferenceKind::Category)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["bakery", "Drinks"]);
        assert!(projection.is_active(tenant, &kilo, ReferenceKind::Unit));
        assert!(!projection.is_active(tenant, &kilo, ReferenceKind::Category));

        let archived = ReferenceEvent::Archived {
            tenant_id: tenant,
            reference_id: drinks,
            occurred_at: test_time(),
        };
        let env = feed.envelope(tenant, drinks.0, AGGREGATE_TYPE, &archived);
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();
        assert_eq!(
            projection.get(tenant, &drinks).unwrap().status,
            ReferenceStatus::Archived
        );
    }
}
