use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId};
use retailpos_events::Event;

use crate::salary_cycle::SalaryPeriod;

pub const AGGREGATE_TYPE: &str = "hr.employee";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub AggregateId);

impl EmployeeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub joining_date: NaiveDate,
}

impl EmployeeProfile {
    fn cleaned(&self) -> Result<EmployeeProfile, DomainError> {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let email = clean(&self.email);
        if email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(DomainError::validation("invalid email format"));
        }
        Ok(EmployeeProfile {
            name: name.to_string(),
            designation: self.designation.trim().to_string(),
            phone: clean(&self.phone),
            email,
            joining_date: self.joining_date,
        })
    }
}

/// Aggregate root: Employee, including the salary account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    id: EmployeeId,
    tenant_id: Option<TenantId>,
    profile: Option<EmployeeProfile>,
    monthly_salary: Money,
    status: EmployeeStatus,
    credited_cycles: BTreeSet<AggregateId>,
    total_credited: Money,
    total_paid: Money,
    version: u64,
    created: bool,
}

impl Employee {
    pub fn empty(id: EmployeeId) -> Self {
        Self {
            id,
            tenant_id: None,
            profile: None,
            monthly_salary: Money::ZERO,
            status: EmployeeStatus::Active,
            credited_cycles: BTreeSet::new(),
            total_credited: Money::ZERO,
            total_paid: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn profile(&self) -> Option<&EmployeeProfile> {
        self.profile.as_ref()
    }

    pub fn monthly_salary(&self) -> Money {
        self.monthly_salary
    }

    pub fn status(&self) -> EmployeeStatus {
        self.status
    }

    pub fn total_credited(&self) -> Money {
        self.total_credited
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    /// Salary owed to the employee: credits minus payouts.
    pub fn balance(&self) -> Money {
        self.total_credited - self.total_paid
    }

    pub fn was_credited_for(&self, cycle_id: AggregateId) -> bool {
        self.credited_cycles.contains(&cycle_id)
    }
}

impl AggregateRoot for Employee {
    type Id = EmployeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub profile: EmployeeProfile,
    pub monthly_salary: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub profile: EmployeeProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSalary {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub monthly_salary: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Issued by the payroll process manager for each credit of a processed salary cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSalary {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub cycle_id: AggregateId,
    pub period: SalaryPeriod,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaySalary {
    pub tenant_id: TenantId,
    pub employee_id: EmployeeId,
    pub amount: Money,
    pub note: Option<String>,
    pub paid_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeCommand {
    Register(RegisterEmployee),
    Update(UpdateEmployee),
    ChangeSalary(ChangeSalary),
    Deactivate(DeactivateEmployee),
    Reactivate(ReactivateEmployee),
    CreditSalary(CreditSalary),
    PaySalary(PaySalary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeEvent {
    Registered {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        profile: EmployeeProfile,
        monthly_salary: Money,
        occurred_at: DateTime<Utc>,
    },
    Updated {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        profile: EmployeeProfile,
        occurred_at: DateTime<Utc>,
    },
    SalaryChanged {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        previous: Money,
        monthly_salary: Money,
        occurred_at: DateTime<Utc>,
    },
    Deactivated {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        occurred_at: DateTime<Utc>,
    },
    Reactivated {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        occurred_at: DateTime<Utc>,
    },
    SalaryCredited {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        cycle_id: AggregateId,
        period: SalaryPeriod,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },
    SalaryPaid {
        tenant_id: TenantId,
        employee_id: EmployeeId,
        amount: Money,
        note: Option<String>,
        paid_by: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl EmployeeEvent {
    pub fn employee_id(&self) -> EmployeeId {
        match self {
            EmployeeEvent::Registered { employee_id, .. }
            | EmployeeEvent::Updated { employee_id, .. }
            | EmployeeEvent::SalaryChanged { employee_id, .. }
            | EmployeeEvent::Deactivated { employee_id, .. }
            | EmployeeEvent::Reactivated { employee_id, .. }
            | EmployeeEvent::SalaryCredited { employee_id, .. }
            | EmployeeEvent::SalaryPaid { employee_id, .. } => *employee_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            EmployeeEvent::Registered { tenant_id, .. }
            | EmployeeEvent::Updated { tenant_id, .. }
            | EmployeeEvent::SalaryChanged { tenant_id, .. }
            | EmployeeEvent::Deactivated { tenant_id, .. }
            | EmployeeEvent::Reactivated { tenant_id, .. }
            | EmployeeEvent::SalaryCredited { tenant_id, .. }
            | EmployeeEvent::SalaryPaid { tenant_id, .. } => *tenant_id,
        }
    }
}

impl Event for EmployeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmployeeEvent::Registered { .. } => "hr.employee.registered",
            EmployeeEvent::Updated { .. } => "hr.employee.updated",
            EmployeeEvent::SalaryChanged { .. } => "hr.employee.salary_changed",
            EmployeeEvent::Deactivated { .. } => "hr.employee.deactivated",
            EmployeeEvent::Reactivated { .. } => "hr.employee.reactivated",
            EmployeeEvent::SalaryCredited { .. } => "hr.employee.salary_credited",
            EmployeeEvent::SalaryPaid { .. } => "hr.employee.salary_paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EmployeeEvent::Registered { occurred_at, .. }
            | EmployeeEvent::Updated { occurred_at, .. }
            | EmployeeEvent::SalaryChanged { occurred_at, .. }
            | EmployeeEvent::Deactivated { occurred_at, .. }
            | EmployeeEvent::Reactivated { occurred_at, .. }
            | EmployeeEvent::SalaryCredited { occurred_at, .. }
            | EmployeeEvent::SalaryPaid { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Employee {
    type Command = EmployeeCommand;
    type Event = EmployeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EmployeeEvent::Registered {
                tenant_id,
                employee_id,
                profile,
                monthly_salary,
                ..
            } => {
                self.id = *employee_id;
                self.tenant_id = Some(*tenant_id);
                self.profile = Some(profile.clone());
                self.monthly_salary = *monthly_salary;
                self.status = EmployeeStatus::Active;
                self.created = true;
            }
            EmployeeEvent::Updated { profile, .. } => self.profile = Some(profile.clone()),
            EmployeeEvent::SalaryChanged { monthly_salary, .. } => {
                self.monthly_salary = *monthly_salary
            }
            EmployeeEvent::Deactivated { .. } => self.status = EmployeeStatus::Inactive,
            EmployeeEvent::Reactivated { .. } => self.status = EmployeeStatus::Active,
            EmployeeEvent::SalaryCredited { cycle_id, amount, .. } => {
                self.credited_cycles.insert(*cycle_id);
                self.total_credited += *amount;
            }
            EmployeeEvent::SalaryPaid { amount, .. } => self.total_paid += *amount,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EmployeeCommand::Register(cmd) => self.handle_register(cmd),
            EmployeeCommand::Update(cmd) => self.handle_update(cmd),
            EmployeeCommand::ChangeSalary(cmd) => self.handle_change_salary(cmd),
            EmployeeCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            EmployeeCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
            EmployeeCommand::CreditSalary(cmd) => self.handle_credit(cmd),
            EmployeeCommand::PaySalary(cmd) => self.handle_pay(cmd),
        }
    }
}

impl Employee {
    fn ensure_exists(&self, tenant_id: TenantId, employee_id: EmployeeId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != employee_id {
            return Err(DomainError::invariant("employee_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("employee already exists"));
        }
        if cmd.monthly_salary.is_negative() {
            return Err(DomainError::validation("monthly salary cannot be negative"));
        }

        Ok(vec![EmployeeEvent::Registered {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            profile: cmd.profile.cleaned()?,
            monthly_salary: cmd.monthly_salary,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update(&self, cmd: &UpdateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        let profile = cmd.profile.cleaned()?;
        if self.profile.as_ref() == Some(&profile) {
            return Ok(vec![]);
        }

        Ok(vec![EmployeeEvent::Updated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            profile,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_salary(&self, cmd: &ChangeSalary) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if cmd.monthly_salary.is_negative() {
            return Err(DomainError::validation("monthly salary cannot be negative"));
        }
        if cmd.monthly_salary == self.monthly_salary {
            return Ok(vec![]);
        }

        Ok(vec![EmployeeEvent::SalaryChanged {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            previous: self.monthly_salary,
            monthly_salary: cmd.monthly_salary,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_deactivate(&self, cmd: &DeactivateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if self.status == EmployeeStatus::Inactive {
            return Err(DomainError::conflict("employee is already inactive"));
        }

        Ok(vec![EmployeeEvent::Deactivated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_reactivate(&self, cmd: &ReactivateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if self.status == EmployeeStatus::Active {
            return Err(DomainError::conflict("employee is already active"));
        }

        Ok(vec![EmployeeEvent::Reactivated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_credit(&self, cmd: &CreditSalary) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if self.credited_cycles.contains(&cmd.cycle_id) {
            return Ok(vec![]);
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("salary credit must be positive"));
        }

        Ok(vec![EmployeeEvent::SalaryCredited {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            cycle_id: cmd.cycle_id,
            period: cmd.period,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_pay(&self, cmd: &PaySalary) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.employee_id)?;
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if cmd.amount > self.balance() {
            return Err(DomainError::validation(format!(
                "payment {} exceeds salary balance {}",
                cmd.amount,
                self.balance()
            )));
        }

        Ok(vec![EmployeeEvent::SalaryPaid {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            amount: cmd.amount,
            note: cmd.note.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            paid_by: cmd.paid_by,
            occurred_at: cmd.occurred_at,
        }])
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

    fn profile(name: &str) -> EmployeeProfile {
        EmployeeProfile {
            name: name.to_string(),
            designation: "Cashier".into(),
            phone: Some(" 555-0199 ".into()),
            email: None,
            joining_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        }
    }

    fn execute(employee: &mut Employee, cmd: EmployeeCommand) -> Result<usize, DomainError> {
        let events = employee.handle(&cmd)?;
        for e in &events {
            employee.apply(e);
        }
        Ok(events.len())
    }

    fn registered(tenant_id: TenantId, employee_id: EmployeeId, salary: i64) -> Employee {
        let mut employee = Employee::empty(employee_id);
        execute(
            &mut employee,
            EmployeeCommand::Register(RegisterEmployee {
                tenant_id,
                employee_id,
                profile: profile(" Dana "),
                monthly_salary: Money::from_minor(salary),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        employee
    }

    fn credit(tenant_id: TenantId, employee_id: EmployeeId, cycle_id: AggregateId, amount: i64) -> EmployeeCommand {
        EmployeeCommand::CreditSalary(CreditSalary {
            tenant_id,
            employee_id,
            cycle_id,
            period: SalaryPeriod::new(2026, 3).unwrap(),
            amount: Money::from_minor(amount),
            occurred_at: test_time(),
        })
    }

    fn pay(tenant_id: TenantId, employee_id: EmployeeId, amount: i64) -> EmployeeCommand {
        EmployeeCommand::PaySalary(PaySalary {
            tenant_id,
            employee_id,
            amount: Money::from_minor(amount),
            note: None,
            paid_by: UserId::new(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn register_cleans_profile() {
        let employee = registered(test_tenant_id(), test_employee_id(), 300_000);
        let p = employee.profile().unwrap();
        assert_eq!(p.name, "Dana");
        assert_eq!(p.phone.as_deref(), Some("555-0199"));
        assert_eq!(employee.monthly_salary(), Money::from_minor(300_000));
        assert_eq!(employee.status(), EmployeeStatus::Active);
    }

    #[test]
    fn register_rejects_blank_name_and_negative_salary() {
        let employee = Employee::empty(test_employee_id());
        let cmd = RegisterEmployee {
            tenant_id: test_tenant_id(),
            employee_id: test_employee_id(),
            profile: profile("  "),
            monthly_salary: Money::ZERO,
            occurred_at: test_time(),
        };
        assert!(matches!(
            employee.handle(&EmployeeCommand::Register(cmd.clone())),
            Err(DomainError::Validation(_))
        ));
        let negative = RegisterEmployee {
            profile: profile("Dana"),
            monthly_salary: Money::from_minor(-5),
            ..cmd
        };
        assert!(matches!(
            employee.handle(&EmployeeCommand::Register(negative)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn credit_is_applied_once_per_cycle() {
        let tenant_id = test_tenant_id();
        let employee_id = test_employee_id();
        let mut employee = registered(tenant_id, employee_id, 300_000);
        let cycle = AggregateId::new();

        assert_eq!(execute(&mut employee, credit(tenant_id, employee_id, cycle, 300_000)).unwrap(), 1);
        assert_eq!(execute(&mut employee, credit(tenant_id, employee_id, cycle, 300_000)).unwrap(), 0);
        assert_eq!(employee.balance(), Money::from_minor(300_000));
        assert!(employee.was_credited_for(cycle));
    }

    #[test]
    fn payout_is_bounded_by_balance() {
        let tenant_id = test_tenant_id();
        let employee_id = test_employee_id();
        let mut employee = registered(tenant_id, employee_id, 100_000);
        execute(&mut employee, credit(tenant_id, employee_id, AggregateId::new(), 100_000)).unwrap();

        assert!(matches!(
            execute(&mut employee, pay(tenant_id, employee_id, 0)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            execute(&mut employee, pay(tenant_id, employee_id, 100_001)),
            Err(DomainError::Validation(_))
        ));
        execute(&mut employee, pay(tenant_id, employee_id, 40_000)).unwrap();
        assert_eq!(employee.total_paid(), Money::from_minor(40_000));
        assert_eq!(employee.balance(), Money::from_minor(60_000));
    }

    #[test]
    fn unchanged_salary_is_a_no_op() {
        let tenant_id = test_tenant_id();
        let employee_id = test_employee_id();
        let mut employee = registered(tenant_id, employee_id, 100_000);
        let same = EmployeeCommand::ChangeSalary(ChangeSalary {
            tenant_id,
            employee_id,
            monthly_salary: Money::from_minor(100_000),
            occurred_at: test_time(),
        });
        assert_eq!(execute(&mut employee, same).unwrap(), 0);
    }

    #[test]
    fn deactivate_twice_conflicts() {
        let tenant_id = test_tenant_id();
        let employee_id = test_employee_id();
        let mut employee = registered(tenant_id, employee_id, 100_000);
        let cmd = EmployeeCommand::Deactivate(DeactivateEmployee {
            tenant_id,
            employee_id,
            occurred_at: test_time(),
        });
        execute(&mut employee, cmd.clone()).unwrap();
        assert_eq!(employee.status(), EmployeeStatus::Inactive);
        assert!(matches!(execute(&mut employee, cmd), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn other_tenant_cannot_touch_employee() {
        let employee_id = test_employee_id();
        let employee = registered(test_tenant_id(), employee_id, 100_000);
        let err = employee.handle(&pay(test_tenant_id(), employee_id, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
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
            fn balance_is_never_negative(
                credits in proptest::collection::vec(1i64..500_000, 1..6),
                payouts in proptest::collection::vec(1i64..800_000, 0..10),
            ) {
                let tenant_id = test_tenant_id();
                let employee_id = test_employee_id();
                let mut employee = registered(tenant_id, employee_id, 100_000);
                for amount in credits {
                    execute(&mut employee, credit(tenant_id, employee_id, AggregateId::new(), amount)).unwrap();
                }
                for amount in payouts {
                    let _ = execute(&mut employee, pay(tenant_id, employee_id, amount));
                    prop_assert!(!employee.balance().is_negative());
                }
                prop_assert_eq!(employee.balance(), employee.total_credited() - employee.total_paid());
            }
        }
    }
}
