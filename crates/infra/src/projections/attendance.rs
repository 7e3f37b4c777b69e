use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{AggregateId, TenantId, UserId};
use retailpos_events::EventEnvelope;
use retailpos_hr::attendance::AGGREGATE_TYPE;
use retailpos_hr::{AttendanceEvent, AttendanceStatus, EmployeeId};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

/// One employee-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReadModel {
    pub attendance_id: AggregateId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
    pub marked_by: UserId,
    pub corrections: u32,
    pub updated_at: DateTime<Utc>,
}

/// Day counts per status for one employee over a date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub employee_id: Option<EmployeeId>,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub leave: u32,
    pub half_day: u32,
}

#[derive(Debug)]
pub struct AttendanceProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> AttendanceProjection<S>
where
    S: TenantStore<AggregateId, AttendanceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, attendance_id: &AggregateId) -> Option<AttendanceReadModel> {
        self.store.get(tenant_id, attendance_id)
    }

    pub fn on_date(&self, tenant_id: TenantId, date: NaiveDate) -> Vec<AttendanceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.date == date)
            .collect();
        rows.sort_by_key(|r| r.employee_id);
        rows
    }

    /// One employee's days in `[from, to]`, oldest first.
    pub fn for_employee(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<AttendanceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.employee_id == employee_id && r.date >= from && r.date <= to)
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    pub fn summary(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AttendanceSummary {
        let mut summary = AttendanceSummary {
            employee_id: Some(employee_id),
            ..AttendanceSummary::default()
        };
        for row in self.for_employee(tenant_id, employee_id, from, to) {
            let slot = match row.status {
                AttendanceStatus::Present => &mut summary.present,
                AttendanceStatus::Absent => &mut summary.absent,
                AttendanceStatus::Late => &mut summary.late,
                AttendanceStatus::Leave => &mut summary.leave,
                AttendanceStatus::HalfDay => &mut summary.half_day,
            };
            *slot += 1;
        }
        summary
    }
}

impl<S> Projection for AttendanceProjection<S>
where
    S: TenantStore<AggregateId, AttendanceReadModel>,
{
    fn name(&self) -> &'static str {
        "hr.attendance"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: AttendanceEvent = decode(envelope)?;
        let corrected = matches!(ev, AttendanceEvent::Corrected(_));
        let (AttendanceEvent::Marked(e) | AttendanceEvent::Corrected(e)) = ev;
        ensure_scope(envelope, e.tenant_id, e.attendance_id)?;

        let corrections = self
            .store
            .get(e.tenant_id, &e.attendance_id)
            .map_or(0, |r| r.corrections)
            + u32::from(corrected);
        self.store.upsert(
            e.tenant_id,
            e.attendance_id,
            AttendanceReadModel {
                attendance_id: e.attendance_id,
                employee_id: e.employee_id,
                date: e.date,
                status: e.status,
                check_in: e.check_in,
                check_out: e.check_out,
                note: e.note,
                marked_by: e.marked_by,
                corrections,
                updated_at: e.occurred_at,
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
    use retailpos_hr::{AttendanceMarked, attendance_id};
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 12, 17, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn marked(tenant_id: TenantId, employee_id: EmployeeId, date: NaiveDate, status: AttendanceStatus) -> AttendanceMarked {
        AttendanceMarked {
            tenant_id,
            attendance_id: attendance_id(employee_id, date),
            employee_id,
            date,
            status,
            check_in: None,
            check_out: None,
            note: None,
            marked_by: UserId::new(),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn correction_replaces_the_day_and_counts() {
        let projection = AttendanceProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let employee = EmployeeId::new(AggregateId::new());
        let first = marked(tenant, employee, day(10), AttendanceStatus::Absent);
        let id = first.attendance_id;

        let mut fixed = marked(tenant, employee, day(10), AttendanceStatus::Late);
        fixed.check_in = NaiveTime::from_hms_opt(9, 40, 0);

        projection
            .apply_envelope(&feed.envelope(tenant, id, AGGREGATE_TYPE, &AttendanceEvent::Marked(first)))
            .unwrap();
        projection
            .apply_envelope(&feed.envelope(tenant, id, AGGREGATE_TYPE, &AttendanceEvent::Corrected(fixed)))
            .unwrap();

        let rows = projection.on_date(tenant, day(10));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Late);
        assert_eq!(rows[0].corrections, 1);
    }

    #[test]
    fn summary_counts_days_in_range() {
        let projection = AttendanceProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let employee = EmployeeId::new(AggregateId::new());

        for (d, status) in [
            (1, AttendanceStatus::Present),
            (2, AttendanceStatus::Present),
            (3, AttendanceStatus::HalfDay),
            (4, AttendanceStatus::Leave),
            (20, AttendanceStatus::Absent),
        ] {
            let ev = AttendanceEvent::Marked(marked(tenant, employee, day(d), status));
            let id = ev.record().attendance_id;
            projection
                .apply_envelope(&feed.envelope(tenant, id, AGGREGATE_TYPE, &ev))
                .unwrap();
        }

        let summary = projection.summary(tenant, employee, day(1), day(15));
        assert_eq!(summary.present, 2);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.leave, 1);
        assert_eq!(summary.absent, 0);
        assert_eq!(projection.for_employee(tenant, employee, day(1), day(30)).len(), 5);
    }
}
