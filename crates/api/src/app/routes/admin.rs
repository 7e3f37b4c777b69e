//! Staff logins and their access.
//!
//! A user record is keyed by the identity provider's subject, so roles and grants
//! recorded here widen what that login's token already allows. Assigning a role or
//! granting a permission checks the actor's own roles to prevent escalation.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use retailpos_auth::permissions::catalog;
use retailpos_auth::user::{self, ActivateUser, SuspendUser};
use retailpos_auth::{
    AssignRole, CreateUser, GrantPermission, LinkEmployee, Permission, RbacRegistry, RevokePermission, RevokeRole,
    Role, User, UserCommand,
};
use retailpos_core::{AggregateId, UserId};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::common::{CmdAuth, ListQuery, committed, page_json, page_of, require};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role", delete(revoke_role))
        .route("/users/:id/permissions", post(grant_permission))
        .route("/users/:id/permissions/:permission", delete(revoke_permission))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/employee", put(link_employee))
        .route("/roles", get(list_roles))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

fn user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id("user"))
}

fn run(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: UserId,
    command: UserCommand,
    status: StatusCode,
) -> ApiResult {
    let cmd = CmdAuth::new(command, catalog::USERS_MANAGE);
    services.guard(tenant, principal, &cmd)?;
    let events = services.dispatch::<User>(
        tenant.tenant_id(),
        AggregateId::from(id),
        user::AGGREGATE_TYPE,
        cmd.inner,
        |_t, aggregate_id| User::empty(UserId::from(aggregate_id)),
    )?;
    Ok(committed(status, id, events.len()))
}

/// The acting admin's roles, including any recorded on their own user record.
fn actor_roles(services: &AppServices, tenant: &TenantContext, principal: &PrincipalContext) -> Vec<Role> {
    let record = services.user_record(tenant, principal);
    authz::combined_roles(principal, record.as_ref())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::USERS_MANAGE)?;
    let email = body.email.trim().to_string();
    if services.users.find_by_email(tenant.tenant_id(), &email).is_some() {
        return Err(ApiError::conflict(format!("a user with email '{email}' already exists")));
    }

    // Initial roles go through the same escalation rule as a later assignment.
    let actor = actor_roles(&services, &tenant, &principal);
    if let Some(role) = body
        .roles
        .iter()
        .find(|r| !actor.iter().any(Role::is_admin) && !actor.contains(r))
    {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("cannot grant role '{}' you do not hold", role.as_str()),
        ));
    }

    let id = body.user_id.unwrap_or_else(|| UserId::from(AggregateId::new()));
    let command = UserCommand::Create(CreateUser {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        email,
        display_name: body.display_name,
        initial_roles: body.roles,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::CREATED)
}

/// POST /admin/users/:id/roles
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<RoleRequest>,
) -> ApiResult {
    let id = user_id(&id)?;
    let command = UserCommand::AssignRole(AssignRole {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        role: Role::new(body.role),
        actor_roles: actor_roles(&services, &tenant, &principal),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// DELETE /admin/users/:id/roles/:role
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> ApiResult {
    let id = user_id(&id)?;
    let command = UserCommand::RevokeRole(RevokeRole {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        role: Role::new(role),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// POST /admin/users/:id/permissions
pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::GrantPermissionRequest>,
) -> ApiResult {
    let id = user_id(&id)?;
    let command = UserCommand::GrantPermission(GrantPermission {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        permission: Permission::new(body.permission.trim().to_string()),
        actor_roles: actor_roles(&services, &tenant, &principal),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// DELETE /admin/users/:id/permissions/:permission
pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, permission)): Path<(String, String)>,
) -> ApiResult {
    let id = user_id(&id)?;
    let command = UserCommand::RevokePermission(RevokePermission {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        permission: Permission::new(permission),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// POST /admin/users/:id/suspend
pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::SuspendUserRequest>>,
) -> ApiResult {
    let id = user_id(&id)?;
    if id == principal.user_id() {
        return Err(ApiError::validation("you cannot suspend yourself"));
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let command = UserCommand::Suspend(SuspendUser {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// POST /admin/users/:id/activate
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id = user_id(&id)?;
    let command = UserCommand::Activate(ActivateUser {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// PUT /admin/users/:id/employee - link (or unlink with `null`) an employee record.
pub async fn link_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LinkEmployeeRequest>,
) -> ApiResult {
    let id = user_id(&id)?;
    if let Some(employee_id) = body.employee_id {
        if services.employees.get(tenant.tenant_id(), &employee_id).is_none() {
            return Err(ApiError::validation("employee does not exist"));
        }
    }
    let command = UserCommand::LinkEmployee(LinkEmployee {
        tenant_id: tenant.tenant_id(),
        user_id: id,
        employee_id: body.employee_id.map(|e| e.0),
        occurred_at: Utc::now(),
    });
    run(&services, &tenant, &principal, id, command, StatusCode::OK)
}

/// GET /admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::USERS_READ)?;
    let id = user_id(&id)?;
    let user = services
        .users
        .get(tenant.tenant_id(), &id)
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Response> {
    require(&services, &tenant, &principal, catalog::USERS_READ)?;
    let rows = services.users.list(tenant.tenant_id());
    Ok(page_json(page_of(rows, &query, &services)))
}

/// GET /admin/roles - built-in roles with their permissions.
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&services, &tenant, &principal, catalog::USERS_READ)?;
    Ok(Json(RbacRegistry::built_in()).into_response())
}
