//! `retailpos-auth`: who may do what in a shop.
//!
//! Token validation, the permission catalogue, role policy, module navigation and
//! the `User` aggregate. Nothing here knows about HTTP or storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod navigation;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{
    AuthzError, CommandAuthorization, PermissionDefinition, Principal, RbacRegistry, RoleDefinition,
    authorize,
};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use navigation::{AppModule, accessible_modules};
pub use permissions::Permission;
pub use policy::{effective_permissions, role_permissions};
pub use principal::TenantMembership;
pub use roles::Role;
pub use user::{
    AssignRole, CreateUser, GrantPermission, LinkEmployee, RevokePermission, RevokeRole, User,
    UserCommand, UserEvent, UserStatus,
};
