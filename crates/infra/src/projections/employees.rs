use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_core::{Money, Searchable, TenantId, UserId};
use retailpos_events::{Event, EventEnvelope};
use retailpos_hr::employee::AGGREGATE_TYPE;
use retailpos_hr::{EmployeeEvent, EmployeeId, EmployeeProfile, EmployeeStatus, SalaryCredit, SalaryPeriod};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryCreditRow {
    pub period: SalaryPeriod,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryPaymentRow {
    pub amount: Money,
    pub note: Option<String>,
    pub paid_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Employee record with its salary account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeReadModel {
    pub employee_id: EmployeeId,
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub joining_date: NaiveDate,
    pub monthly_salary: Money,
    pub status: EmployeeStatus,
    pub total_credited: Money,
    pub total_paid: Money,
    /// Credited but not yet paid out.
    pub balance: Money,
    pub credits: Vec<SalaryCreditRow>,
    pub payments: Vec<SalaryPaymentRow>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeReadModel {
    fn set_profile(&mut self, profile: EmployeeProfile) {
        self.name = profile.name;
        self.designation = profile.designation;
        self.phone = profile.phone;
        self.email = profile.email;
        self.joining_date = profile.joining_date;
    }
}

impl Searchable for EmployeeReadModel {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.designation.as_str()];
        fields.extend(self.phone.as_deref());
        fields.extend(self.email.as_deref());
        fields
    }
}

#[derive(Debug)]
pub struct EmployeesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> EmployeesProjection<S>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, employee_id: &EmployeeId) -> Option<EmployeeReadModel> {
        self.store.get(tenant_id, employee_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        rows
    }

    /// Credits for a salary cycle: every active employee with a non-zero salary who had
    /// joined by the end of `period`, one full month each.
    pub fn salary_credits(&self, tenant_id: TenantId, period: SalaryPeriod) -> Vec<SalaryCredit> {
        let Some(last_day) = period.last_day() else {
            return Vec::new();
        };
        self.list(tenant_id)
            .into_iter()
            .filter(|e| e.status == EmployeeStatus::Active && e.monthly_salary.is_positive())
            .filter(|e| e.joining_date <= last_day)
            .map(|e| SalaryCredit {
                employee_id: e.employee_id,
                employee_name: e.name,
                amount: e.monthly_salary,
            })
            .collect()
    }

    /// Σ salary paid out to date.
    pub fn total_paid(&self, tenant_id: TenantId) -> Money {
        self.store.list(tenant_id).iter().map(|e| e.total_paid).sum()
    }

    fn update(&self, tenant_id: TenantId, id: EmployeeId, at: DateTime<Utc>, f: impl FnOnce(&mut EmployeeReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &id) {
            f(&mut rm);
            rm.balance = rm.total_credited - rm.total_paid;
            rm.updated_at = at;
            self.store.upsert(tenant_id, id, rm);
        }
    }
}

impl<S> Projection for EmployeesProjection<S>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    fn name(&self) -> &'static str {
        "hr.employees"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: EmployeeEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let employee_id = ev.employee_id();
        ensure_scope(envelope, tenant_id, employee_id.0)?;
        let at = ev.occurred_at();

        match ev {
            EmployeeEvent::Registered {
                profile,
                monthly_salary,
                ..
            } => {
                self.store.upsert(
                    tenant_id,
                    employee_id,
                    EmployeeReadModel {
                        employee_id,
                        name: profile.name,
                        designation: profile.designation,
                        phone: profile.phone,
                        email: profile.email,
                        joining_date: profile.joining_date,
                        monthly_salary,
                        status: EmployeeStatus::Active,
                        total_credited: Money::ZERO,
                        total_paid: Money::ZERO,
                        balance: Money::ZERO,
                        credits: Vec::new(),
                        payments: Vec::new(),
                        updated_at: at,
                    },
                );
            }
            EmployeeEvent::Updated { profile, .. } => {
                self.update(tenant_id, employee_id, at, |rm| rm.set_profile(profile));
            }
            EmployeeEvent::SalaryChanged { monthly_salary, .. } => {
                self.update(tenant_id, employee_id, at, |rm| rm.monthly_salary = monthly_salary);
            }
            EmployeeEvent::Deactivated { .. } => {
                self.update(tenant_id, employee_id, at, |rm| rm.status = EmployeeStatus::Inactive);
            }
            EmployeeEvent::Reactivated { .. } => {
                self.update(tenant_id, employee_id, at, |rm| rm.status = EmployeeStatus::Active);
            }
            EmployeeEvent::SalaryCredited { period, amount, .. } => {
                self.update(tenant_id, employee_id, at, |rm| {
                    rm.total_credited += amount;
                    rm.credits.push(SalaryCreditRow {
                        period,
                        amount,
                        occurred_at: at,
                    });
                });
            }
            EmployeeEvent::SalaryPaid {
                amount, note, paid_by, ..
            } => {
                self.update(tenant_id, employee_id, at, |rm| {
                    rm.total_paid += amount;
                    rm.payments.push(SalaryPaymentRow {
                        amount,
                        note,
                        paid_by,
                        occurred_at: at,
                    });
                });
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
