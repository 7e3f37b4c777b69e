use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_hr::{ProcessSalaryCycle, SalaryCycle, SalaryCycleCommand, SalaryPeriod, salary_cycle, salary_cycle_id};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, committed, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/cycles", post(process_cycle).get(list_cycles))
        .route("/cycles/:id", get(get_cycle))
}

/// Credit one month's salary to every active employee who had joined by the month's end.
///
/// Credits are computed here from the employee read model; the cycle stream id is
/// derived from the month, so a second run for the same month is a conflict.
pub async fn process_cycle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ProcessPayrollRequest>,
) -> ApiResult {
    let tenant_id = tenant.tenant_id();
    let period = SalaryPeriod::new(body.year, body.month).map_err(|e| ApiError::validation(e.to_string()))?;
    let cycle_id = salary_cycle_id(tenant_id, period);
    let cmd = CmdAuth::new(
        SalaryCycleCommand::Process(ProcessSalaryCycle {
            tenant_id,
            cycle_id,
            period,
            credits: services.employees.salary_credits(tenant_id, period),
            processed_by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
        catalog::PAYROLL_PROCESS,
    );
    services.guard(&tenant, &principal, &cmd)?;

    let events = services.dispatch::<SalaryCycle>(
        tenant_id,
        cycle_id,
        salary_cycle::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| SalaryCycle::empty(aggregate_id),
    )?;
    Ok(committed(StatusCode::CREATED, cycle_id, events.len()))
}

pub async fn list_cycles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::PAYROLL_READ)?;
    let rows = services.salary_cycles.list(tenant.tenant_id());
    Ok(Json(serde_json::json!({ "items": rows })).into_response())
}

pub async fn get_cycle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::PAYROLL_READ)?;
    let id = parse_id(&id, "salary cycle")?;
    let cycle = services
        .salary_cycles
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("salary cycle"))?;
    Ok((StatusCode::OK, Json(cycle)).into_response())
}
