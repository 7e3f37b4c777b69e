use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use retailpos_auth::permissions::catalog;
use retailpos_catalog::{
    ArchiveProduct, CreateProduct, Product, ProductCommand, ProductDetails, ProductId, ReactivateProduct,
    ReferenceKind, UpdateProduct, product,
};
use retailpos_core::{AggregateId, TenantId};
use retailpos_inventory::{MovementKind, RecordMovement, StockCommand, StockItem, stock};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, bounded_quantity, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/lookup", get(lookup_product))
        .route("/:id", get(get_product).put(update_product))
        .route("/:id/archive", post(archive_product))
        .route("/:id/reactivate", post(reactivate_product))
}

fn product_id(raw: &str) -> Result<ProductId, ApiError> {
    Ok(ProductId::new(parse_id(raw, "product")?))
}

/// Category and unit must be live entries of the right kind.
fn check_references(services: &AppServices, tenant_id: TenantId, details: &ProductDetails) -> Result<(), ApiError> {
    if !services
        .references
        .is_active(tenant_id, &details.category_id, ReferenceKind::Category)
    {
        return Err(ApiError::validation("category does not exist or is archived"));
    }
    if !services.references.is_active(tenant_id, &details.unit_id, ReferenceKind::Unit) {
        return Err(ApiError::validation("unit does not exist or is archived"));
    }
    Ok(())
}

fn dispatch_product(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: ProductId,
    command: ProductCommand,
    status: StatusCode,
) -> ApiResult {
    let cmd = CmdAuth::new(command, catalog::CATALOG_WRITE);
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<Product>(
        tenant.tenant_id(),
        id.0,
        product::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> ApiResult {
    let tenant_id = tenant.tenant_id();
    let id = ProductId::new(AggregateId::new());
    let code = body.code.trim().to_string();

    let opening = match body.opening_stock.filter(|q| *q != 0) {
        Some(quantity) if quantity < 0 => return Err(ApiError::validation("opening stock must be positive")),
        Some(quantity) => {
            let cmd = CmdAuth::new(
                StockCommand::RecordMovement(RecordMovement {
                    tenant_id,
                    product_id: id,
                    kind: MovementKind::Opening,
                    quantity: bounded_quantity(quantity)?,
                    reference: None,
                    note: Some("opening stock".to_string()),
                    occurred_at: Utc::now(),
                }),
                catalog::INVENTORY_ADJUST,
            );
            services.guard(&tenant, &principal, &cmd)?;
            Some(cmd.inner)
        }
        None => None,
    };

    let cmd = CmdAuth::new(
        ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id: id,
            code: code.clone(),
            details: body.details.clone(),
            occurred_at: Utc::now(),
        }),
        catalog::CATALOG_WRITE,
    );
    services.guard(&tenant, &principal, &cmd)?;
    if services.products.find_by_code(tenant_id, &code).is_some() {
        return Err(ApiError::conflict(format!("product code '{code}' is already in use")));
    }
    check_references(&services, tenant_id, &body.details)?;

    let mut events = services
        .dispatch::<Product>(tenant_id, id.0, product::AGGREGATE_TYPE, cmd.inner, |_t, aggregate_id| {
            Product::empty(ProductId::new(aggregate_id))
        })?
        .len();

    if let Some(movement) = opening {
        events += services
            .dispatch::<StockItem>(tenant_id, id.0, stock::AGGREGATE_TYPE, movement, |_t, aggregate_id| {
                StockItem::empty(ProductId::new(aggregate_id))
            })?
            .len();
    }

    Ok(committed(StatusCode::CREATED, id, events))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(details): Json<ProductDetails>,
) -> ApiResult {
    let id = product_id(&id)?;
    check_references(&services, tenant.tenant_id(), &details)?;
    let command = ProductCommand::UpdateProduct(UpdateProduct {
        tenant_id: tenant.tenant_id(),
        product_id: id,
        details,
        occurred_at: Utc::now(),
    });
    dispatch_product(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = product_id(&id)?;
    let command = ProductCommand::ArchiveProduct(ArchiveProduct {
        tenant_id: tenant.tenant_id(),
        product_id: id,
        occurred_at: Utc::now(),
    });
    dispatch_product(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn reactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = product_id(&id)?;
    let command = ProductCommand::ReactivateProduct(ReactivateProduct {
        tenant_id: tenant.tenant_id(),
        product_id: id,
        occurred_at: Utc::now(),
    });
    dispatch_product(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::CATALOG_READ)?;
    let id = product_id(&id)?;
    let product = services
        .products
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("product"))?;
    let on_hand = services.stock.on_hand(tenant.tenant_id(), &id);
    Ok(Json(serde_json::json!({ "product": product, "on_hand": on_hand })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub code: String,
}

/// Barcode / code lookup for the till.
pub async fn lookup_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LookupQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::CATALOG_READ)?;
    let product = services
        .products
        .find_by_code(tenant.tenant_id(), query.code.trim())
        .ok_or_else(|| ApiError::not_found("product"))?;
    let on_hand = services.stock.on_hand(tenant.tenant_id(), &product.product_id);
    Ok(Json(serde_json::json!({ "product": product, "on_hand": on_hand })).into_response())
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::CATALOG_READ)?;
    let rows = services.products.list(tenant.tenant_id());
    Ok(page_json(page_of(rows, &query, &services)))
}
