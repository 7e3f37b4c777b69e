use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_catalog::ProductId;
use retailpos_inventory::{MovementKind, RecordMovement, StockCommand, StockItem, stock};

use crate::app::dto::{self, InventoryRow};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, bounded_quantity, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/low-stock", get(low_stock))
        .route("/:product_id", get(get_stock))
        .route("/:product_id/adjust", post(adjust_stock))
        .route("/:product_id/opening", post(opening_stock))
}

fn record(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    raw_id: &str,
    kind: MovementKind,
    body: dto::StockMovementRequest,
) -> ApiResult {
    let product_id = ProductId::new(parse_id(raw_id, "product")?);
    let cmd = CmdAuth::new(
        StockCommand::RecordMovement(RecordMovement {
            tenant_id: tenant.tenant_id(),
            product_id,
            kind,
            quantity: bounded_quantity(body.quantity)?,
            reference: None,
            note: body.note,
            occurred_at: Utc::now(),
        }),
        catalog::INVENTORY_ADJUST,
    );
    services.guard(tenant, principal, &cmd)?;
    if services.products.get(tenant.tenant_id(), &product_id).is_none() {
        return Err(ApiError::not_found("product"));
    }

    let events = services.dispatch::<StockItem>(
        tenant.tenant_id(),
        product_id.0,
        stock::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| StockItem::empty(ProductId::new(aggregate_id)),
    )?;
    Ok(committed(StatusCode::OK, product_id, events.len()))
}

/// Signed manual correction (damage, count differences).
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::StockMovementRequest>,
) -> ApiResult {
    record(&services, &tenant, &principal, &product_id, MovementKind::Adjustment, body)
}

pub async fn opening_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::StockMovementRequest>,
) -> ApiResult {
    record(&services, &tenant, &principal, &product_id, MovementKind::Opening, body)
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::INVENTORY_READ)?;
    let product_id = ProductId::new(parse_id(&product_id, "product")?);
    let product = services
        .products
        .get(tenant.tenant_id(), &product_id)
        .ok_or_else(|| ApiError::not_found("product"))?;
    let stock = services.stock.get(tenant.tenant_id(), &product_id);
    let movements = stock.as_ref().map(|s| s.movements.clone()).unwrap_or_default();

    Ok(Json(serde_json::json!({
        "item": InventoryRow::new(product, stock.as_ref()),
        "movements": movements,
    }))
    .into_response())
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::INVENTORY_READ)?;
    let tenant_id = tenant.tenant_id();
    let stock: HashMap<ProductId, _> = services
        .stock
        .list(tenant_id)
        .into_iter()
        .map(|s| (s.product_id, s))
        .collect();
    let rows: Vec<InventoryRow> = services
        .products
        .list(tenant_id)
        .into_iter()
        .map(|p| {
            let level = stock.get(&p.product_id);
            InventoryRow::new(p, level)
        })
        .collect();
    Ok(page_json(page_of(rows, &query, &services)))
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::INVENTORY_READ)?;
    let products = services.products.list(tenant.tenant_id());
    let rows = services.stock.low_stock(tenant.tenant_id(), &products);
    Ok(Json(serde_json::json!({ "items": rows })).into_response())
}
