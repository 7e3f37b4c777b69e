//! Daily attendance: one stream per employee and calendar day.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use retailpos_events::Event;

use crate::employee::EmployeeId;

pub const AGGREGATE_TYPE: &str = "hr.attendance";

/// Stream id for `employee` on `date`.
pub fn attendance_id(employee_id: EmployeeId, date: NaiveDate) -> AggregateId {
    AggregateId::derived(employee_id.0.as_uuid(), &date.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
    HalfDay,
}

impl AttendanceStatus {
    /// Absent and leave days have no clock times.
    pub fn allows_times(self) -> bool {
        !matches!(self, AttendanceStatus::Absent | AttendanceStatus::Leave)
    }
}

/// Aggregate root: Attendance for one employee-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    employee_id: Option<EmployeeId>,
    date: Option<NaiveDate>,
    status: Option<AttendanceStatus>,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
    note: Option<String>,
    corrections: u32,
    version: u64,
}

impl Attendance {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            date: None,
            status: None,
            check_in: None,
            check_out: None,
            note: None,
            corrections: 0,
            version: 0,
        }
    }

    pub fn status(&self) -> Option<AttendanceStatus> {
        self.status
    }

    pub fn check_in(&self) -> Option<NaiveTime> {
        self.check_in
    }

    pub fn check_out(&self) -> Option<NaiveTime> {
        self.check_out
    }

    pub fn corrections(&self) -> u32 {
        self.corrections
    }
}

impl AggregateRoot for Attendance {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAttendance {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
    pub marked_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceCommand {
    Mark(MarkAttendance),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMarked {
    pub tenant_id: TenantId,
    pub attendance_id: AggregateId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
    pub marked_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceEvent {
    Marked(AttendanceMarked),
    Corrected(AttendanceMarked),
}

impl AttendanceEvent {
    pub fn record(&self) -> &AttendanceMarked {
        match self {
            AttendanceEvent::Marked(e) | AttendanceEvent::Corrected(e) => e,
        }
    }
}

impl Event for AttendanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AttendanceEvent::Marked(_) => "hr.attendance.marked",
            AttendanceEvent::Corrected(_) => "hr.attendance.corrected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.record().occurred_at
    }
}

impl Aggregate for Attendance {
    type Command = AttendanceCommand;
    type Event = AttendanceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        if let AttendanceEvent::Corrected(_) = event {
            self.corrections += 1;
        }
        let e = event.record();
        self.id = e.attendance_id;
        self.tenant_id = Some(e.tenant_id);
        self.employee_id = Some(e.employee_id);
        self.date = Some(e.date);
        self.status = Some(e.status);
        self.check_in = e.check_in;
        self.check_out = e.check_out;
        self.note = e.note.clone();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AttendanceCommand::Mark(cmd) => self.handle_mark(cmd),
        }
    }
}

impl Attendance {
    fn handle_mark(&self, cmd: &MarkAttendance) -> Result<Vec<AttendanceEvent>, DomainError> {
        if attendance_id(cmd.employee_id, cmd.date) != self.id {
            return Err(DomainError::invariant("attendance id does not match employee and date"));
        }
        if self.tenant_id.is_some_and(|t| t != cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if cmd.date > cmd.occurred_at.date_naive() {
            return Err(DomainError::validation("cannot mark attendance for a future date"));
        }
        if !cmd.status.allows_times() && (cmd.check_in.is_some() || cmd.check_out.is_some()) {
            return Err(DomainError::validation("absent or leave days cannot have check-in/out times"));
        }
        if cmd.check_out.is_some() && cmd.check_in.is_none() {
            return Err(DomainError::validation("check-out requires a check-in"));
        }
        if let (Some(check_in), Some(check_out)) = (cmd.check_in, cmd.check_out) {
            if check_out <= check_in {
                return Err(DomainError::validation("check-out must be after check-in"));
            }
        }

        let note = cmd.note.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        if self.status == Some(cmd.status)
            && self.check_in == cmd.check_in
            && self.check_out == cmd.check_out
            && self.note == note
        {
            return Ok(vec![]);
        }

        let record = AttendanceMarked {
            tenant_id: cmd.tenant_id,
            attendance_id: self.id,
            employee_id: cmd.employee_id,
            date: cmd.date,
            status: cmd.status,
            check_in: cmd.check_in,
            check_out: cmd.check_out,
            note,
            marked_by: cmd.marked_by,
            occurred_at: cmd.occurred_at,
        };
        if self.status.is_some() {
            Ok(vec![AttendanceEvent::Corrected(record)])
        } else {
            Ok(vec![AttendanceEvent::Marked(record)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_employee_id() -> EmployeeId {
        EmployeeId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn mark(
        tenant_id: TenantId,
        employee_id: EmployeeId,
        date: NaiveDate,
        status: AttendanceStatus,
        times: Option<(NaiveTime, NaiveTime)>,
    ) -> AttendanceCommand {
        AttendanceCommand::Mark(MarkAttendance {
            tenant_id,
            employee_id,
            date,
            status,
            check_in: times.map(|(i, _)| i),
            check_out: times.map(|(_, o)| o),
            note: None,
            marked_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    fn execute(attendance: &mut Attendance, cmd: AttendanceCommand) -> Result<Vec<AttendanceEvent>, DomainError> {
        let events = attendance.handle(&cmd)?;
        for e in &events {
            attendance.apply(e);
        }
        Ok(events)
    }

    #[test]
    fn ids_are_stable_per_employee_and_day() {
        let employee = test_employee_id();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(attendance_id(employee, day), attendance_id(employee, day));
        assert_ne!(attendance_id(employee, day), attendance_id(employee, next));
        assert_ne!(attendance_id(employee, day), attendance_id(test_employee_id(), day));
    }

    #[test]
    fn first_mark_then_correction_then_no_op() {
        let tenant_id = test_tenant_id();
        let employee = test_employee_id();
        let day = test_time().date_naive();
        let mut attendance = Attendance::empty(attendance_id(employee, day));

        let first = execute(
            &mut attendance,
            mark(tenant_id, employee, day, AttendanceStatus::Present, Some((t(9, 0), t(17, 0)))),
        )
        .unwrap();
        assert!(matches!(first.as_slice(), [AttendanceEvent::Marked(_)]));

        let fix = mark(tenant_id, employee, day, AttendanceStatus::Late, Some((t(9, 40), t(17, 0))));
        let second = execute(&mut attendance, fix.clone()).unwrap();
        assert!(matches!(second.as_slice(), [AttendanceEvent::Corrected(_)]));
        assert_eq!(attendance.status(), Some(AttendanceStatus::Late));
        assert_eq!(attendance.corrections(), 1);

        assert!(execute(&mut attendance, fix).unwrap().is_empty());
    }

    #[test]
    fn rejects_future_dates_and_bad_times() {
        let tenant_id = test_tenant_id();
        let employee = test_employee_id();
        let tomorrow = test_time().date_naive().succ_opt().unwrap();
        let future = Attendance::empty(attendance_id(employee, tomorrow));
        assert!(matches!(
            future.handle(&mark(tenant_id, employee, tomorrow, AttendanceStatus::Present, None)),
            Err(DomainError::Validation(_))
        ));

        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let attendance = Attendance::empty(attendance_id(employee, day));
        assert!(matches!(
            attendance.handle(&mark(tenant_id, employee, day, AttendanceStatus::Present, Some((t(17, 0), t(9, 0))))),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            attendance.handle(&mark(tenant_id, employee, day, AttendanceStatus::Leave, Some((t(9, 0), t(10, 0))))),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn stream_must_match_employee_and_date() {
        let employee = test_employee_id();
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let attendance = Attendance::empty(AggregateId::new());
        assert!(matches!(
            attendance.handle(&mark(test_tenant_id(), employee, day, AttendanceStatus::Absent, None)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            #[test]
            fn accepted_times_are_ordered(in_min in 0u32..1440, out_min in 0u32..1440) {
                let employee = test_employee_id();
                let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
                let attendance = Attendance::empty(attendance_id(employee, day));
                let check_in = t(in_min / 60, in_min % 60);
                let check_out = t(out_min / 60, out_min % 60);
                let result = attendance.handle(&mark(
                    test_tenant_id(),
                    employee,
                    day,
                    AttendanceStatus::Present,
                    Some((check_in, check_out)),
                ));
                prop_assert_eq!(result.is_ok(), check_out > check_in);
            }
        }
    }
}
