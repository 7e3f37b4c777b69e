use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_core::AggregateId;
use retailpos_hr::{
    ChangeSalary, DeactivateEmployee, Employee, EmployeeCommand, EmployeeId, EmployeeProfile, PaySalary,
    ReactivateEmployee, RegisterEmployee, UpdateEmployee, employee,
};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_employee).get(list_employees))
        .route("/:id", get(get_employee).put(update_employee))
        .route("/:id/salary", put(change_salary))
        .route("/:id/deactivate", post(deactivate_employee))
        .route("/:id/reactivate", post(reactivate_employee))
        .route("/:id/pay", post(pay_salary))
}

fn employee_id(raw: &str) -> Result<EmployeeId, ApiError> {
    Ok(EmployeeId::new(parse_id(raw, "employee")?))
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: EmployeeId,
    cmd: CmdAuth<EmployeeCommand>,
    status: StatusCode,
) -> ApiResult {
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<Employee>(
        tenant.tenant_id(),
        id.0,
        employee::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Employee::empty(EmployeeId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

pub async fn register_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterEmployeeRequest>,
) -> ApiResult {
    let id = EmployeeId::new(AggregateId::new());
    let cmd = CmdAuth::new(
        EmployeeCommand::Register(RegisterEmployee {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            profile: body.profile,
            monthly_salary: body.monthly_salary,
            occurred_at: Utc::now(),
        }),
        catalog::EMPLOYEES_WRITE,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::CREATED)
}

pub async fn update_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(profile): Json<EmployeeProfile>,
) -> ApiResult {
    let id = employee_id(&id)?;
    let cmd = CmdAuth::new(
        EmployeeCommand::Update(UpdateEmployee {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            profile,
            occurred_at: Utc::now(),
        }),
        catalog::EMPLOYEES_WRITE,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn change_salary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeSalaryRequest>,
) -> ApiResult {
    let id = employee_id(&id)?;
    let cmd = CmdAuth::new(
        EmployeeCommand::ChangeSalary(ChangeSalary {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            monthly_salary: body.monthly_salary,
            occurred_at: Utc::now(),
        }),
        catalog::EMPLOYEES_WRITE,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn deactivate_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = employee_id(&id)?;
    let cmd = CmdAuth::new(
        EmployeeCommand::Deactivate(DeactivateEmployee {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            occurred_at: Utc::now(),
        }),
        catalog::EMPLOYEES_WRITE,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn reactivate_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = employee_id(&id)?;
    let cmd = CmdAuth::new(
        EmployeeCommand::Reactivate(ReactivateEmployee {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            occurred_at: Utc::now(),
        }),
        catalog::EMPLOYEES_WRITE,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

/// Pay out part or all of the employee's credited balance.
pub async fn pay_salary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaySalaryRequest>,
) -> ApiResult {
    let id = employee_id(&id)?;
    let cmd = CmdAuth::new(
        EmployeeCommand::PaySalary(PaySalary {
            tenant_id: tenant.tenant_id(),
            employee_id: id,
            amount: body.amount,
            note: body.note,
            paid_by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
        catalog::PAYROLL_PAY,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::EMPLOYEES_READ)?;
    let id = employee_id(&id)?;
    let employee = services
        .employees
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("employee"))?;
    Ok((StatusCode::OK, Json(employee)).into_response())
}

pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::EMPLOYEES_READ)?;
    let rows = services.employees.list(tenant.tenant_id());
    Ok(page_json(page_of(rows, &query, &services)))
}
