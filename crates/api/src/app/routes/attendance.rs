use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_hr::{Attendance, AttendanceCommand, EmployeeId, MarkAttendance, attendance, attendance_id};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, RangeQuery, committed, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(day_sheet).post(mark_attendance))
        .route("/employees/:id", get(employee_attendance))
}

/// Mark (or correct) one employee's day. The stream id is derived from employee and date.
pub async fn mark_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::MarkAttendanceRequest>,
) -> ApiResult {
    let tenant_id = tenant.tenant_id();
    let date = body.date.unwrap_or_else(|| Utc::now().date_naive());
    let cmd = CmdAuth::new(
        AttendanceCommand::Mark(MarkAttendance {
            tenant_id,
            employee_id: body.employee_id,
            date,
            status: body.status,
            check_in: body.check_in,
            check_out: body.check_out,
            note: body.note,
            marked_by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
        catalog::ATTENDANCE_MARK,
    );
    services.guard(&tenant, &principal, &cmd)?;
    if services.employees.get(tenant_id, &body.employee_id).is_none() {
        return Err(ApiError::validation("employee does not exist"));
    }

    let id = attendance_id(body.employee_id, date);
    let events = services.dispatch::<Attendance>(
        tenant_id,
        id,
        attendance::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Attendance::empty(aggregate_id),
    )?;
    Ok(committed(StatusCode::OK, id, events.len()))
}

/// Everyone's attendance on one day (today by default).
pub async fn day_sheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AttendanceDayQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::ATTENDANCE_READ)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let rows = services.attendance.on_date(tenant.tenant_id(), date);
    Ok(Json(serde_json::json!({ "date": date, "items": rows })).into_response())
}

/// One employee's days and status counts over `?from&to` (this month by default).
pub async fn employee_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::ATTENDANCE_READ)?;
    let employee_id = EmployeeId::new(parse_id(&id, "employee")?);
    let range = query.range()?;
    let tenant_id = tenant.tenant_id();
    Ok(Json(serde_json::json!({
        "employee_id": employee_id,
        "range": range,
        "items": services.attendance.for_employee(tenant_id, employee_id, range.from, range.to),
        "summary": services.attendance.summary(tenant_id, employee_id, range.from, range.to),
    }))
    .into_response())
}
