//! Monthly salary run: one stream per tenant and month, processed once.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId};
use retailpos_events::Event;

use crate::employee::EmployeeId;

pub const AGGREGATE_TYPE: &str = "hr.salary_cycle";

/// Calendar month a salary is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SalaryPeriod {
    pub year: i32,
    pub month: u32,
}

impl SalaryPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation("month must be between 1 and 12"));
        }
        if !(2000..=2100).contains(&year) {
            return Err(DomainError::validation("year must be between 2000 and 2100"));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.first_day()?.checked_add_months(Months::new(1))?.pred_opt()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl core::fmt::Display for SalaryPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Stream id of a tenant's salary cycle for `period`.
pub fn salary_cycle_id(tenant_id: TenantId, period: SalaryPeriod) -> AggregateId {
    AggregateId::derived(tenant_id.as_uuid(), &format!("salary-cycle:{period}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryCredit {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub amount: Money,
}

/// Aggregate root: SalaryCycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalaryCycle {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    period: Option<SalaryPeriod>,
    credits: Vec<SalaryCredit>,
    total: Money,
    processed: bool,
    version: u64,
}

impl SalaryCycle {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            period: None,
            credits: Vec::new(),
            total: Money::ZERO,
            processed: false,
            version: 0,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn period(&self) -> Option<SalaryPeriod> {
        self.period
    }

    pub fn credits(&self) -> &[SalaryCredit] {
        &self.credits
    }

    pub fn total(&self) -> Money {
        self.total
    }
}

impl AggregateRoot for SalaryCycle {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Credits are computed by the caller from the active employees' monthly salaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSalaryCycle {
    pub tenant_id: TenantId,
    pub cycle_id: AggregateId,
    pub period: SalaryPeriod,
    pub credits: Vec<SalaryCredit>,
    pub processed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalaryCycleCommand {
    Process(ProcessSalaryCycle),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryCycleProcessed {
    pub tenant_id: TenantId,
    pub cycle_id: AggregateId,
    pub period: SalaryPeriod,
    pub credits: Vec<SalaryCredit>,
    pub total: Money,
    pub processed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalaryCycleEvent {
    Processed(SalaryCycleProcessed),
}

impl Event for SalaryCycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalaryCycleEvent::Processed(_) => "hr.salary_cycle.processed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalaryCycleEvent::Processed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalaryCycle {
    type Command = SalaryCycleCommand;
    type Event = SalaryCycleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalaryCycleEvent::Processed(e) => {
                self.id = e.cycle_id;
                self.tenant_id = Some(e.tenant_id);
                self.period = Some(e.period);
                self.credits = e.credits.clone();
                self.total = e.total;
                self.processed = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalaryCycleCommand::Process(cmd) => self.handle_process(cmd),
        }
    }
}

impl SalaryCycle {
    fn handle_process(&self, cmd: &ProcessSalaryCycle) -> Result<Vec<SalaryCycleEvent>, DomainError> {
        if self.processed {
            return Err(DomainError::conflict(format!(
                "salary cycle {} has already been processed",
                cmd.period
            )));
        }
        let period = SalaryPeriod::new(cmd.period.year, cmd.period.month)?;
        if cmd.cycle_id != self.id || salary_cycle_id(cmd.tenant_id, period) != self.id {
            return Err(DomainError::invariant("cycle_id does not match the period"));
        }
        if cmd.credits.is_empty() {
            return Err(DomainError::validation("no active employees to credit"));
        }

        let mut seen = BTreeSet::new();
        for credit in &cmd.credits {
            if !credit.amount.is_positive() {
                return Err(DomainError::validation(format!(
                    "salary credit for {} must be positive",
                    credit.employee_name
                )));
            }
            if !seen.insert(credit.employee_id) {
                return Err(DomainError::validation(format!(
                    "employee {} is credited twice",
                    credit.employee_id
                )));
            }
        }

        Ok(vec![SalaryCycleEvent::Processed(SalaryCycleProcessed {
            tenant_id: cmd.tenant_id,
            cycle_id: cmd.cycle_id,
            period,
            credits: cmd.credits.clone(),
            total: cmd.credits.iter().map(|c| c.amount).sum(),
            processed_by: cmd.processed_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
