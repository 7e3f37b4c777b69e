//! Categories and units. Both are `ReferenceEntry` streams told apart by kind.

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
use retailpos_catalog::{
    ArchiveReference, CreateReference, ReferenceCommand, ReferenceEntry, ReferenceId, ReferenceKind,
    RenameReference, RestoreReference, reference,
};
use retailpos_core::AggregateId;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, committed, page_json, page_of, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router(kind: ReferenceKind) -> Router {
    Router::new()
        .route("/", post(create_reference).get(list_references))
        .route("/:id", get(get_reference).put(rename_reference))
        .route("/:id/archive", post(archive_reference))
        .route("/:id/restore", post(restore_reference))
        .layer(Extension(kind))
}

fn what(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Category => "category",
        ReferenceKind::Unit => "unit",
    }
}

/// Parse the path id and reject ids known to belong to the other kind.
fn reference_id(
    services: &AppServices,
    tenant: &TenantContext,
    kind: ReferenceKind,
    raw: &str,
) -> Result<ReferenceId, ApiError> {
    let id = ReferenceId::new(parse_id(raw, what(kind))?);
    match services.references.get(tenant.tenant_id(), &id) {
        Some(rm) if rm.kind != kind => Err(ApiError::not_found(what(kind))),
        _ => Ok(id),
    }
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: ReferenceId,
    command: ReferenceCommand,
    status: StatusCode,
) -> ApiResult {
    let cmd = CmdAuth::new(command, catalog::CATALOG_WRITE);
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<ReferenceEntry>(
        tenant.tenant_id(),
        id.0,
        reference::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| ReferenceEntry::empty(ReferenceId::new(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

pub async fn create_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Json(body): Json<dto::ReferenceRequest>,
) -> ApiResult {
    let id = ReferenceId::new(AggregateId::new());
    let command = ReferenceCommand::Create(CreateReference {
        tenant_id: tenant.tenant_id(),
        reference_id: id,
        kind,
        name: body.name,
        short_name: body.short_name,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::CREATED)
}

pub async fn rename_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReferenceRequest>,
) -> ApiResult {
    let id = reference_id(&services, &tenant, kind, &id)?;
    let command = ReferenceCommand::Rename(RenameReference {
        tenant_id: tenant.tenant_id(),
        reference_id: id,
        name: body.name,
        short_name: body.short_name,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn archive_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = reference_id(&services, &tenant, kind, &id)?;
    let command = ReferenceCommand::Archive(ArchiveReference {
        tenant_id: tenant.tenant_id(),
        reference_id: id,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn restore_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = reference_id(&services, &tenant, kind, &id)?;
    let command = ReferenceCommand::Restore(RestoreReference {
        tenant_id: tenant.tenant_id(),
        reference_id: id,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

pub async fn get_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::CATALOG_READ)?;
    let id = ReferenceId::new(parse_id(&id, what(kind))?);
    match services.references.get(tenant.tenant_id(), &id) {
        Some(rm) if rm.kind == kind => Ok((StatusCode::OK, Json(rm)).into_response()),
        _ => Err(ApiError::not_found(what(kind))),
    }
}

pub async fn list_references(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(kind): Extension<ReferenceKind>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::CATALOG_READ)?;
    let rows = services.references.list(tenant.tenant_id(), kind);
    Ok(page_json(page_of(rows, &query, &services)))
}
