//! Customers and suppliers. One router per party kind, with kind-specific permissions.

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
use retailpos_core::AggregateId;
use retailpos_parties::{
    CustomerRef, Party, PartyCommand, PartyId, PartyKind, ReactivateParty, RegisterParty, SuspendParty,
    UpdateDetails, party,
};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn customers_router() -> Router {
    common_routes()
        .route("/:id/sales", get(customer_sales))
        .layer(Extension(PartyKind::Customer))
}

pub fn suppliers_router() -> Router {
    common_routes()
        .route("/:id/purchases", get(supplier_purchases))
        .layer(Extension(PartyKind::Supplier))
}

fn common_routes() -> Router {
    Router::new()
        .route("/", post(register_party).get(list_parties))
        .route("/:id", get(get_party).put(update_party))
        .route("/:id/suspend", post(suspend_party))
        .route("/:id/reactivate", post(reactivate_party))
}

fn read_permission(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => catalog::CUSTOMERS_READ,
        PartyKind::Supplier => catalog::SUPPLIERS_READ,
    }
}

fn write_permission(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => catalog::CUSTOMERS_WRITE,
        PartyKind::Supplier => catalog::SUPPLIERS_WRITE,
    }
}

fn what(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => "customer",
        PartyKind::Supplier => "supplier",
    }
}

/// Parse the path id and reject ids known to belong to the other kind.
fn party_id(services: &AppServices, tenant: &TenantContext, kind: PartyKind, raw: &str) -> Result<PartyId, ApiError> {
    let id = PartyId::new(parse_id(raw, what(kind))?);
    match services.parties.get(tenant.tenant_id(), &id) {
        Some(rm) if rm.kind != kind => Err(ApiError::not_found(what(kind))),
        _ => Ok(id),
    }
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    kind: PartyKind,
    id: PartyId,
    command: PartyCommand,
    status: StatusCode,
) -> ApiResult {
    let cmd = CmdAuth::new(command, write_permission(kind));
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<Party>(
        tenant.tenant_id(),
        id.0,
        party::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

pub async fn register_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Json(body): Json<dto::RegisterPartyRequest>,
) -> ApiResult {
    let id = PartyId::new(AggregateId::new());
    let command = PartyCommand::Register(RegisterParty {
        tenant_id: tenant.tenant_id(),
        party_id: id,
        kind,
        name: body.name,
        contact: body.contact,
        opening_balance: body.opening_balance,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, kind, id, command, StatusCode::CREATED)
}

pub async fn update_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePartyRequest>,
) -> ApiResult {
    let id = party_id(&services, &tenant, kind, &id)?;
    let command = PartyCommand::UpdateDetails(UpdateDetails {
        tenant_id: tenant.tenant_id(),
        party_id: id,
        name: body.name,
        contact: body.contact,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, kind, id, command, StatusCode::OK)
}

pub async fn suspend_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    let id = party_id(&services, &tenant, kind, &id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let command = PartyCommand::Suspend(SuspendParty {
        tenant_id: tenant.tenant_id(),
        party_id: id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, kind, id, command, StatusCode::OK)
}

pub async fn reactivate_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = party_id(&services, &tenant, kind, &id)?;
    let command = PartyCommand::Reactivate(ReactivateParty {
        tenant_id: tenant.tenant_id(),
        party_id: id,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, kind, id, command, StatusCode::OK)
}

pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, read_permission(kind))?;
    let id = PartyId::new(parse_id(&id, what(kind))?);
    match services.parties.get(tenant.tenant_id(), &id) {
        Some(rm) if rm.kind == kind => Ok((StatusCode::OK, Json(rm)).into_response()),
        _ => Err(ApiError::not_found(what(kind))),
    }
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<PartyKind>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, read_permission(kind))?;
    let rows = services.parties.list(tenant.tenant_id(), kind);
    Ok(page_json(page_of(rows, &query, &services)))
}

/// Every sale recorded against a registered customer.
pub async fn customer_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::SALES_READ)?;
    let id = PartyId::new(parse_id(&id, "customer")?);
    let customer = CustomerRef::Registered { party_id: id };
    let rows: Vec<_> = services
        .sales
        .list(tenant.tenant_id())
        .into_iter()
        .filter(|s| s.customer == customer)
        .collect();
    Ok(page_json(page_of(rows, &query, &services)))
}

pub async fn supplier_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::PURCHASES_READ)?;
    let id = PartyId::new(parse_id(&id, "supplier")?);
    let rows: Vec<_> = services
        .purchases
        .list(tenant.tenant_id())
        .into_iter()
        .filter(|p| p.supplier_id == id)
        .collect();
    Ok(page_json(page_of(rows, &query, &services)))
}
