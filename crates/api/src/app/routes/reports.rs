//! Reports over `?from&to` (inclusive, current month by default). `?format=html` prints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_infra::reports::{self, CapitalInputs};
use retailpos_parties::PartyKind;

use crate::app::errors::ApiResult;
use crate::app::routes::common::{FormatQuery, RangeQuery, printable, require, wants_html};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/sales-summary", get(sales_summary))
        .route("/purchase-summary", get(purchase_summary))
        .route("/profit-loss", get(profit_loss))
        .route("/capital", get(capital))
}

pub async fn sales_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RangeQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::REPORTS_READ)?;
    let range = query.range()?;
    let sales = services.sales.completed_between(tenant.tenant_id(), range.from, range.to);
    let report = reports::sales_summary(&sales, range);
    Ok(printable(&services, query.wants_html(), &report, |r| r.to_document()))
}

pub async fn purchase_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RangeQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::REPORTS_READ)?;
    let range = query.range()?;
    let tenant_id = tenant.tenant_id();
    let purchases = services.purchases.received_between(tenant_id, range.from, range.to);
    let suppliers = services.parties.list(tenant_id, PartyKind::Supplier);
    let report = reports::purchase_summary(&purchases, &suppliers, range);
    Ok(printable(&services, query.wants_html(), &report, |r| r.to_document()))
}

pub async fn profit_loss(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RangeQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::REPORTS_READ)?;
    let range = query.range()?;
    let tenant_id = tenant.tenant_id();
    let sales = services.sales.completed_between(tenant_id, range.from, range.to);
    let cycles = services.salary_cycles.list(tenant_id);
    let report = reports::profit_loss(&sales, &cycles, range);
    Ok(printable(&services, query.wants_html(), &report, |r| r.to_document()))
}

/// Capital as of today. Takes no range.
pub async fn capital(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<FormatQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::REPORTS_READ)?;
    let tenant_id = tenant.tenant_id();
    let products = services.products.list(tenant_id);
    let stock = services.stock.list(tenant_id);
    let sales = services.sales.completed(tenant_id);
    let purchases = services.purchases.received(tenant_id);

    let report = reports::capital(
        CapitalInputs {
            products: &products,
            stock: &stock,
            sales: &sales,
            purchases: &purchases,
            receivables: services.parties.total_receivables(tenant_id),
            payables: services.parties.total_payables(tenant_id),
            salaries_paid: services.employees.total_paid(tenant_id),
        },
        Utc::now().date_naive(),
    );
    Ok(printable(&services, wants_html(query.format.as_deref()), &report, |r| r.to_document()))
}
