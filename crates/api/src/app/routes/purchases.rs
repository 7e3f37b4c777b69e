use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;

use retailpos_auth::permissions::catalog;
use retailpos_catalog::ProductId;
use retailpos_core::AggregateId;
use retailpos_parties::{PartyKind, PartyStatus};
use retailpos_purchasing::{
    AddPurchaseLine, CancelPurchase, CreatePurchase, PayPurchase, Purchase, PurchaseCommand, PurchaseId,
    ReceivePurchase, RemovePurchaseLine, SetPurchaseDiscount, purchase,
};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, bounded_quantity, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase).get(list_purchases))
        .route("/:id", get(get_purchase))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:product_id", delete(remove_line))
        .route("/:id/discount", put(set_discount))
        .route("/:id/receive", post(receive_purchase))
        .route("/:id/payments", post(pay_purchase))
        .route("/:id/cancel", post(cancel_purchase))
}

fn purchase_id(raw: &str) -> Result<PurchaseId, ApiError> {
    Ok(PurchaseId::new(parse_id(raw, "purchase")?))
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: PurchaseId,
    command: PurchaseCommand,
    status: StatusCode,
) -> ApiResult {
    let cmd = CmdAuth::new(command, catalog::PURCHASES_WRITE);
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<Purchase>(
        tenant.tenant_id(),
        id.0,
        purchase::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Purchase::empty(PurchaseId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePurchaseRequest>,
) -> ApiResult {
    match services.parties.get(tenant.tenant_id(), &body.supplier_id) {
        Some(p) if p.kind == PartyKind::Supplier && p.status == PartyStatus::Active => {}
        Some(p) if p.kind == PartyKind::Supplier => return Err(ApiError::validation("supplier is suspended")),
        _ => return Err(ApiError::validation("supplier does not exist")),
    }
    let id = PurchaseId::new(AggregateId::new());
    let command = PurchaseCommand::Create(CreatePurchase {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        supplier_id: body.supplier_id,
        supplier_reference: body.supplier_reference,
        purchase_date: body.purchase_date.unwrap_or_else(|| Utc::now().date_naive()),
        created_by: principal.user_id(),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::CREATED)
}

/// Add a product line. The name is snapshotted and the cost defaults to the catalogue cost price.
pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PurchaseLineRequest>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let product = services
        .products
        .get(tenant.tenant_id(), &body.product_id)
        .ok_or_else(|| ApiError::validation("product does not exist"))?;
    let command = PurchaseCommand::AddLine(AddPurchaseLine {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        product_id: product.product_id,
        product_name: product.name,
        quantity: bounded_quantity(body.quantity)?,
        unit_cost: body.unit_cost.unwrap_or(product.cost_price),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, product_id)): Path<(String, String)>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let command = PurchaseCommand::RemoveLine(RemovePurchaseLine {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        product_id: ProductId::new(parse_id(&product_id, "product")?),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn set_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DiscountRequest>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let command = PurchaseCommand::SetDiscount(SetPurchaseDiscount {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        discount: body.discount,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// Goods arrived: stock goes up through the stock-sync process.
pub async fn receive_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReceivePurchaseRequest>>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let command = PurchaseCommand::Receive(ReceivePurchase {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        paid: body.paid,
        received_by: principal.user_id(),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn pay_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PurchasePaymentRequest>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let command = PurchaseCommand::Pay(PayPurchase {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        amount: body.amount,
        paid_by: principal.user_id(),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn cancel_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    let id = purchase_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let command = PurchaseCommand::Cancel(CancelPurchase {
        tenant_id: tenant.tenant_id(),
        purchase_id: id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::PURCHASES_READ)?;
    let id = purchase_id(&id)?;
    let purchase = services
        .purchases
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("purchase"))?;
    Ok((StatusCode::OK, Json(purchase)).into_response())
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::PURCHASES_READ)?;
    let rows = services.purchases.list(tenant.tenant_id());
    Ok(page_json(page_of(rows, &query, &services)))
}
