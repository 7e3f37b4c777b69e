use serde::Serialize;
use thiserror::Error;

use retailpos_core::{TenantId, UserId};

use crate::permissions::catalog;
use crate::{Permission, Role, TenantMembership, role_permissions};

/// Authenticated caller resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("user account is suspended")]
    Suspended,
}

/// Permissions a command needs before it may be dispatched.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str());

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub area: String,
    pub description: String,
}

/// Listing of built-in roles and the permission catalogue, served to the user admin screen.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    pub permissions: Vec<PermissionDefinition>,
}

impl RbacRegistry {
    pub fn built_in() -> Self {
        let roles = Role::BUILT_IN
            .iter()
            .map(|name| RoleDefinition {
                name: (*name).to_string(),
                description: role_description(name).to_string(),
                permissions: role_permissions(name)
                    .into_iter()
                    .map(|p| p.as_str().to_string())
                    .collect(),
            })
            .collect();

        let permissions = catalog::ALL
            .iter()
            .map(|name| {
                let perm = Permission::from_static(*name);
                PermissionDefinition {
                    name: (*name).to_string(),
                    area: perm.area().to_string(),
                    description: permission_description(&perm),
                }
            })
            .collect();

        Self { roles, permissions }
    }

    pub fn role(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name == name)
    }
}

fn role_description(role: &str) -> &'static str {
    match role {
        Role::ADMIN => "Owner or administrator; every permission including user management",
        Role::MANAGER => "Runs the shop day to day; everything except managing user accounts",
        Role::CASHIER => "Works the till: sells, looks up products and registers customers",
        Role::STOREKEEPER => "Maintains the catalogue and stock, receives supplier purchases",
        Role::ACCOUNTANT => "Reads reports, sales and purchases; processes and pays salaries",
        _ => "",
    }
}

fn permission_description(perm: &Permission) -> String {
    let action = perm.as_str().rsplit('.').next().unwrap_or_default();
    let verb = match action {
        "read" => "View",
        "write" => "Create and edit",
        "adjust" => "Adjust",
        "mark" => "Mark",
        "process" => "Process",
        "pay" => "Pay out",
        "sell" => "Sell through",
        "cancel" => "Cancel",
        "manage" => "Manage",
        other => other,
    };
    format!("{verb} {}", perm.area())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(tenant: TenantId, perms: &[&'static str]) -> Principal {
        Principal {
            user_id: UserId::new(),
            active_tenant_id: tenant,
            membership: TenantMembership {
                tenant_id: tenant,
                roles: vec![],
                permissions: perms.iter().map(|p| Permission::from_static(*p)).collect(),
            },
        }
    }

    #[test]
    fn exact_permission_is_allowed() {
        let p = principal(TenantId::new(), &[catalog::POS_SELL]);
        assert_eq!(authorize(&p, &Permission::from_static(catalog::POS_SELL)), Ok(()));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let p = principal(TenantId::new(), &[catalog::POS_SELL]);
        assert_eq!(
            authorize(&p, &Permission::from_static(catalog::PAYROLL_PAY)),
            Err(AuthzError::Forbidden("payroll.pay".into()))
        );
    }

    #[test]
    fn wildcard_allows_everything() {
        let p = principal(TenantId::new(), &[catalog::WILDCARD]);
        assert!(authorize(&p, &Permission::from_static(catalog::USERS_MANAGE)).is_ok());
    }

    #[test]
    fn tenant_mismatch_wins_over_wildcard() {
        let mut p = principal(TenantId::new(), &[catalog::WILDCARD]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::from_static(catalog::SALES_READ)),
            Err(AuthzError::TenantMismatch)
        );
    }

    #[test]
    fn registry_lists_built_in_roles_and_catalogue() {
        let registry = RbacRegistry::built_in();
        assert_eq!(registry.roles.len(), Role::BUILT_IN.len());
        assert_eq!(registry.permissions.len(), catalog::ALL.len());
        assert_eq!(registry.role("admin").map(|r| r.permissions.clone()), Some(vec!["*".to_string()]));
        assert!(!registry.role("cashier").unwrap().description.is_empty());
    }
}
