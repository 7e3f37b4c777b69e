use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{sse::Event as SseEvent, IntoResponse, Response},
    Json,
};
use chrono::Utc;

use retailpos_auth::{AppModule, accessible_modules, permissions::catalog};
use retailpos_infra::reports::{self, DateRange};

use crate::app::errors::ApiResult;
use crate::app::routes::common::require;
use crate::app::services::{self, AppServices};
use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let record = services.user_record(&tenant, &principal);
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "user_id": principal.user_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "display_name": record.as_ref().map(|r| r.display_name.clone()),
        "status": record.as_ref().map(|r| r.status),
    }))
}

/// Menu entries the caller may open.
pub async fn my_modules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let resolved = services.resolve(&tenant, &principal)?;
    let modules: Vec<_> = accessible_modules(&resolved.membership.permissions)
        .into_iter()
        .map(|m: AppModule| {
            serde_json::json!({
                "module": m,
                "label": m.label(),
                "permission": m.required_permission(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "modules": modules,
        "permissions": resolved.membership.permissions,
    }))
    .into_response())
}

pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::tenant_sse_stream(services, tenant.tenant_id())
}

/// Today's takings, the month so far, and what needs attention.
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::REPORTS_READ)?;
    let tenant_id = tenant.tenant_id();
    let today = Utc::now().date_naive();
    let month = reports::month_of(today);

    let today_sales = services.sales.completed_between(tenant_id, today, today);
    let month_sales = services.sales.completed_between(tenant_id, month.from, month.to);
    let today_range = DateRange::new(today, today)?;

    let products = services.products.list(tenant_id);
    let low_stock = services.stock.low_stock(tenant_id, &products);

    Ok(Json(serde_json::json!({
        "date": today,
        "today": reports::sales_summary(&today_sales, today_range),
        "month": reports::profit_loss(&month_sales, &services.salary_cycles.list(tenant_id), month),
        "receivables": services.parties.total_receivables(tenant_id),
        "payables": services.parties.total_payables(tenant_id),
        "low_stock": low_stock,
        "held_sales": services.sales.held_for(tenant_id, principal.user_id()).len(),
        "product_count": products.len(),
    }))
    .into_response())
}
