use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{AggregateId, Money, TenantId, UserId};
use retailpos_events::EventEnvelope;
use retailpos_hr::salary_cycle::AGGREGATE_TYPE;
use retailpos_hr::{SalaryCredit, SalaryCycleEvent, SalaryPeriod};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryCycleReadModel {
    pub cycle_id: AggregateId,
    pub period: SalaryPeriod,
    pub credits: Vec<SalaryCredit>,
    pub total: Money,
    pub processed_by: UserId,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SalaryCyclesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> SalaryCyclesProjection<S>
where
    S: TenantStore<AggregateId, SalaryCycleReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, cycle_id: &AggregateId) -> Option<SalaryCycleReadModel> {
        self.store.get(tenant_id, cycle_id)
    }

    /// Newest period first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<SalaryCycleReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| b.period.cmp(&a.period));
        rows
    }
}

impl<S> Projection for SalaryCyclesProjection<S>
where
    S: TenantStore<AggregateId, SalaryCycleReadModel>,
{
    fn name(&self) -> &'static str {
        "hr.salary_cycles"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let SalaryCycleEvent::Processed(e) = decode::<SalaryCycleEvent>(envelope)?;
        ensure_scope(envelope, e.tenant_id, e.cycle_id)?;
        self.store.upsert(
            e.tenant_id,
            e.cycle_id,
            SalaryCycleReadModel {
                cycle_id: e.cycle_id,
                period: e.period,
                credits: e.credits,
                total: e.total,
                processed_by: e.processed_by,
                processed_at: e.occurred_at,
            },
        );

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
    use retailpos_hr::{EmployeeId, SalaryCycleProcessed, salary_cycle_id};
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn cycles_list_newest_first() {
        let projection = SalaryCyclesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();

        for month in [4, 6, 5] {
            let period = SalaryPeriod { year: 2026, month };
            let cycle_id = salary_cycle_id(tenant, period);
            let ev = SalaryCycleEvent::Processed(SalaryCycleProcessed {
                tenant_id: tenant,
                cycle_id,
                period,
                credits: vec![SalaryCredit {
                    employee_id: EmployeeId::new(AggregateId::new()),
                    employee_name: "Ana".into(),
                    amount: Money::from_minor(100_000),
                }],
                total: Money::from_minor(100_000),
                processed_by: UserId::new(),
                occurred_at: test_time(),
            });
            projection
                .apply_envelope(&feed.envelope(tenant, cycle_id, AGGREGATE_TYPE, &ev))
                .unwrap();
        }

        let months: Vec<u32> = projection.list(tenant).iter().map(|c| c.period.month).collect();
        assert_eq!(months, vec![6, 5, 4]);
        assert!(projection.list(test_tenant_id()).is_empty());
    }
}
