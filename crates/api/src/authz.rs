//! Authorization guard at the command boundary.
//!
//! Runs before dispatch so aggregates and infra stay auth-agnostic. Effective permissions
//! are the role policy of the token's roles, plus, when the login has a user record, the
//! record's roles and direct grants. A suspended record is refused outright.

use retailpos_auth::{
    AuthzError, CommandAuthorization, Permission, Principal, Role, TenantMembership, authorize,
    effective_permissions,
};
use retailpos_infra::projections::UserReadModel;

use crate::context::{PrincipalContext, TenantContext};

/// Resolve the caller's principal in the current tenant.
pub fn resolve_principal(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    record: Option<&UserReadModel>,
) -> Result<Principal, AuthzError> {
    if record.is_some_and(UserReadModel::is_suspended) {
        return Err(AuthzError::Suspended);
    }

    let roles = combined_roles(principal, record);
    let direct: &[Permission] = record.map(|r| r.permissions.as_slice()).unwrap_or_default();

    Ok(Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: tenant.tenant_id(),
            permissions: effective_permissions(&roles, direct),
            roles,
        },
    })
}

/// Token roles followed by any extra roles on the user record.
pub fn combined_roles(principal: &PrincipalContext, record: Option<&UserReadModel>) -> Vec<Role> {
    let mut roles = principal.roles().to_vec();
    for role in record.map(|r| r.roles.as_slice()).unwrap_or_default() {
        if !roles.contains(role) {
            roles.push(role.clone());
        }
    }
    roles
}

/// Check authorization for a command in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    record: Option<&UserReadModel>,
    command: &C,
) -> Result<Principal, AuthzError> {
    let resolved = resolve_principal(tenant, principal, record)?;
    for perm in command.required_permissions() {
        authorize(&resolved, perm)?;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use retailpos_auth::UserStatus;
    use retailpos_auth::permissions::catalog;
    use retailpos_core::{TenantId, UserId};

    struct Needs(Vec<Permission>);

    impl CommandAuthorization for Needs {
        fn required_permissions(&self) -> &[Permission] {
            &self.0
        }
    }

    fn needs(perm: &'static str) -> Needs {
        Needs(vec![Permission::from_static(perm)])
    }

    fn record(user_id: UserId, roles: &[&'static str], grants: &[&'static str], status: UserStatus) -> UserReadModel {
        UserReadModel {
            user_id,
            email: "till@shop.test".into(),
            display_name: "Till".into(),
            roles: roles.iter().map(|r| Role::new(*r)).collect(),
            permissions: grants.iter().map(|p| Permission::from_static(*p)).collect(),
            effective_permissions: vec![],
            employee_id: None,
            status,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_roles_follow_the_role_policy() {
        let tenant = TenantContext::new(TenantId::new());
        let cashier = PrincipalContext::new(UserId::new(), vec![Role::new(Role::CASHIER)]);

        assert!(authorize_command(&tenant, &cashier, None, &needs(catalog::POS_SELL)).is_ok());
        assert_eq!(
            authorize_command(&tenant, &cashier, None, &needs(catalog::REPORTS_READ)),
            Err(AuthzError::Forbidden(catalog::REPORTS_READ.into()))
        );
    }

    #[test]
    fn user_record_adds_roles_and_grants() {
        let tenant = TenantContext::new(TenantId::new());
        let user_id = UserId::new();
        let principal = PrincipalContext::new(user_id, vec![Role::new(Role::CASHIER)]);
        let rec = record(user_id, &[Role::STOREKEEPER], &[catalog::REPORTS_READ], UserStatus::Active);

        assert!(authorize_command(&tenant, &principal, Some(&rec), &needs(catalog::PURCHASES_WRITE)).is_ok());
        assert!(authorize_command(&tenant, &principal, Some(&rec), &needs(catalog::REPORTS_READ)).is_ok());
        assert!(authorize_command(&tenant, &principal, Some(&rec), &needs(catalog::USERS_MANAGE)).is_err());
    }

    #[test]
    fn suspended_record_blocks_even_admins() {
        let tenant = TenantContext::new(TenantId::new());
        let user_id = UserId::new();
        let admin = PrincipalContext::new(user_id, vec![Role::new(Role::ADMIN)]);
        let rec = record(user_id, &[], &[], UserStatus::Suspended);

        assert_eq!(
            authorize_command(&tenant, &admin, Some(&rec), &needs(catalog::SALES_READ)),
            Err(AuthzError::Suspended)
        );
    }
}
