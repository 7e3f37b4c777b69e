//! The till: open a sale, scan items, hold/resume, take payment, print the invoice.

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
use retailpos_catalog::{ProductId, ProductStatus};
use retailpos_core::{AggregateId, TenantId};
use retailpos_infra::projections::ProductReadModel;
use retailpos_infra::reports::invoice_document;
use retailpos_parties::{CustomerRef, PartyKind, PartyStatus};
use retailpos_sales::{
    AddItem, CancelSale, CartProduct, CompleteSale, HoldSale, OpenSale, ReceivePayment, RemoveItem, ResumeSale, Sale,
    SaleCommand, SaleId, SetCustomer, SetDiscount, UpdateQuantity, sale,
};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{
    CmdAuth, FormatQuery, ListQuery, committed, page_json, page_of, parse_id, printable, require, wants_html,
};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(open_sale).get(list_sales))
        .route("/sales/:id", get(get_sale))
        .route("/sales/:id/items", post(add_item))
        .route("/sales/:id/items/:product_id", put(update_quantity).delete(remove_item))
        .route("/sales/:id/discount", put(set_discount))
        .route("/sales/:id/customer", put(set_customer))
        .route("/sales/:id/hold", post(hold_sale))
        .route("/sales/:id/resume", post(resume_sale))
        .route("/sales/:id/complete", post(complete_sale))
        .route("/sales/:id/payments", post(receive_payment))
        .route("/sales/:id/cancel", post(cancel_sale))
        .route("/sales/:id/invoice", get(sale_invoice))
        .route("/held", get(held_sales))
}

fn sale_id(raw: &str) -> Result<SaleId, ApiError> {
    Ok(SaleId::new(parse_id(raw, "sale")?))
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: SaleId,
    cmd: CmdAuth<SaleCommand>,
    status: StatusCode,
) -> ApiResult {
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<Sale>(
        tenant.tenant_id(),
        id.0,
        sale::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Sale::empty(SaleId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

fn sell(command: SaleCommand) -> CmdAuth<SaleCommand> {
    CmdAuth::new(command, catalog::POS_SELL)
}

/// A registered customer must exist and be active.
fn check_customer(services: &AppServices, tenant_id: TenantId, customer: &CustomerRef) -> Result<(), ApiError> {
    let Some(party_id) = customer.party_id() else {
        return Ok(());
    };
    match services.parties.get(tenant_id, &party_id) {
        Some(p) if p.kind == PartyKind::Customer && p.status == PartyStatus::Active => Ok(()),
        Some(p) if p.kind == PartyKind::Customer => Err(ApiError::validation("customer is suspended")),
        _ => Err(ApiError::validation("customer does not exist")),
    }
}

/// Snapshot of a product as the till sees it, with the current on-hand quantity.
fn cart_product(services: &AppServices, tenant_id: TenantId, product: ProductReadModel) -> Result<CartProduct, ApiError> {
    if product.status != ProductStatus::Active {
        return Err(ApiError::validation(format!("product '{}' is archived", product.code)));
    }
    Ok(CartProduct {
        available: services.stock.on_hand(tenant_id, &product.product_id),
        product_id: product.product_id,
        code: product.code,
        name: product.name,
        sale_price: product.sale_price,
        cost_price: product.cost_price,
    })
}

pub async fn open_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::OpenSaleRequest>>,
) -> ApiResult {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    check_customer(&services, tenant.tenant_id(), &body.customer)?;
    let id = SaleId::new(AggregateId::new());
    let cmd = sell(SaleCommand::Open(OpenSale {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        cashier: principal.user_id(),
        customer: body.customer,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::CREATED)
}

/// Scan one unit of a product, by id or by code.
pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddItemRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let tenant_id = tenant.tenant_id();
    let product = match (body.product_id, body.code.as_deref()) {
        (Some(product_id), _) => services.products.get(tenant_id, &product_id),
        (None, Some(code)) => services.products.find_by_code(tenant_id, code.trim()),
        (None, None) => return Err(ApiError::validation("product_id or code is required")),
    }
    .ok_or_else(|| ApiError::not_found("product"))?;

    let cmd = sell(SaleCommand::AddItem(AddItem {
        tenant_id,
        sale_id: id,
        product: cart_product(&services, tenant_id, product)?,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn update_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, product_id)): Path<(String, String)>,
    Json(body): Json<dto::UpdateQuantityRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let product_id = ProductId::new(parse_id(&product_id, "product")?);
    let cmd = sell(SaleCommand::UpdateQuantity(UpdateQuantity {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        product_id,
        quantity: body.quantity,
        available: services.stock.on_hand(tenant.tenant_id(), &product_id),
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, product_id)): Path<(String, String)>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let cmd = sell(SaleCommand::RemoveItem(RemoveItem {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        product_id: ProductId::new(parse_id(&product_id, "product")?),
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn set_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DiscountRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let cmd = sell(SaleCommand::SetDiscount(SetDiscount {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        discount: body.discount,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn set_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetCustomerRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    check_customer(&services, tenant.tenant_id(), &body.customer)?;
    let cmd = sell(SaleCommand::SetCustomer(SetCustomer {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        customer: body.customer,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

/// Park the cart as a held invoice for this cashier.
pub async fn hold_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::HoldSaleRequest>>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let cmd = sell(SaleCommand::Hold(HoldSale {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        cashier: principal.user_id(),
        note: body.note,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn resume_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let cmd = sell(SaleCommand::Resume(ResumeSale {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        cashier: principal.user_id(),
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn complete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CompleteSaleRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let cmd = sell(SaleCommand::Complete(CompleteSale {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        paid: body.paid,
        method: body.method,
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

/// Collect (part of) a registered customer's due on a completed sale.
pub async fn receive_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SalePaymentRequest>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let cmd = sell(SaleCommand::ReceivePayment(ReceivePayment {
        tenant_id: tenant.tenant_id(),
        sale_id: id,
        amount: body.amount,
        method: body.method,
        received_by: principal.user_id(),
        occurred_at: Utc::now(),
    }));
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    let id = sale_id(&id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let cmd = CmdAuth::new(
        SaleCommand::Cancel(CancelSale {
            tenant_id: tenant.tenant_id(),
            sale_id: id,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
        catalog::SALES_CANCEL,
    );
    run(&services, &tenant, &principal, id, cmd, StatusCode::OK)
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::SALES_READ)?;
    let id = sale_id(&id)?;
    let sale = services
        .sales
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("sale"))?;
    Ok((StatusCode::OK, Json(sale)).into_response())
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::SALES_READ)?;
    let rows = services.sales.list(tenant.tenant_id());
    Ok(page_json(page_of(rows, &query, &services)))
}

/// The caller's held invoices.
pub async fn held_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::POS_SELL)?;
    let rows = services.sales.held_for(tenant.tenant_id(), principal.user_id());
    Ok(Json(serde_json::json!({ "items": rows })).into_response())
}

pub async fn sale_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<FormatQuery>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::SALES_READ)?;
    let id = sale_id(&id)?;
    let sale = services
        .sales
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("sale"))?;
    let customer_name = sale
        .customer
        .party_id()
        .and_then(|party_id| services.parties.get(tenant.tenant_id(), &party_id))
        .map(|p| p.name);

    Ok(printable(&services, wants_html(query.format.as_deref()), &sale, |s| {
        invoice_document(s, customer_name.as_deref())
    }))
}
