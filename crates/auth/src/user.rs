//! Staff login accounts (event-sourced).
//!
//! A user record refines what a token's roles grant: extra roles, direct permission
//! grants, suspension, and the link to the employee record used by HR.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use retailpos_events::Event;

use crate::{Permission, Role};

pub const AGGREGATE_TYPE: &str = "auth.user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => f.write_str("active"),
            UserStatus::Suspended => f.write_str("suspended"),
        }
    }
}

/// # Invariants
/// - tenant is fixed at creation
/// - suspended users cannot receive roles or permissions
/// - an actor can only hand out roles it holds itself, unless it is an admin
/// - the wildcard permission can only be granted by an admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub employee_id: Option<AggregateId>,
    pub status: UserStatus,
    pub version: u64,
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            permissions: Vec::new(),
            employee_id: None,
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.as_str() == permission)
    }

    fn ensure_exists(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_not_suspended(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    /// Roles of whoever issues the command.
    pub actor_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPermission {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub actor_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePermission {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Link (or with `None`, unlink) the login to an employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEmployee {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    AssignRole(AssignRole),
    RevokeRole(RevokeRole),
    GrantPermission(GrantPermission),
    RevokePermission(RevokePermission),
    Suspend(SuspendUser),
    Activate(ActivateUser),
    LinkEmployee(LinkEmployee),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGranted {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSuspended {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeLinked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    RoleAssigned(RoleAssigned),
    RoleRevoked(RoleRevoked),
    PermissionGranted(PermissionGranted),
    PermissionRevoked(PermissionRevoked),
    Suspended(UserSuspended),
    Activated(UserActivated),
    EmployeeLinked(EmployeeLinked),
}

impl UserEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            UserEvent::Created(e) => e.user_id,
            UserEvent::RoleAssigned(e) => e.user_id,
            UserEvent::RoleRevoked(e) => e.user_id,
            UserEvent::PermissionGranted(e) => e.user_id,
            UserEvent::PermissionRevoked(e) => e.user_id,
            UserEvent::Suspended(e) => e.user_id,
            UserEvent::Activated(e) => e.user_id,
            UserEvent::EmployeeLinked(e) => e.user_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            UserEvent::Created(e) => e.tenant_id,
            UserEvent::RoleAssigned(e) => e.tenant_id,
            UserEvent::RoleRevoked(e) => e.tenant_id,
            UserEvent::PermissionGranted(e) => e.tenant_id,
            UserEvent::PermissionRevoked(e) => e.tenant_id,
            UserEvent::Suspended(e) => e.tenant_id,
            UserEvent::Activated(e) => e.tenant_id,
            UserEvent::EmployeeLinked(e) => e.tenant_id,
        }
    }
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::RoleAssigned(_) => "auth.user.role_assigned",
            UserEvent::RoleRevoked(_) => "auth.user.role_revoked",
            UserEvent::PermissionGranted(_) => "auth.user.permission_granted",
            UserEvent::PermissionRevoked(_) => "auth.user.permission_revoked",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
            UserEvent::EmployeeLinked(_) => "auth.user.employee_linked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::RoleRevoked(e) => e.occurred_at,
            UserEvent::PermissionGranted(e) => e.occurred_at,
            UserEvent::PermissionRevoked(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
            UserEvent::EmployeeLinked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.roles = e.initial_roles.clone();
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::RoleAssigned(e) => self.roles.push(e.role.clone()),
            UserEvent::RoleRevoked(e) => self.roles.retain(|r| r != &e.role),
            UserEvent::PermissionGranted(e) => self.permissions.push(e.permission.clone()),
            UserEvent::PermissionRevoked(e) => self.permissions.retain(|p| p != &e.permission),
            UserEvent::Suspended(_) => self.status = UserStatus::Suspended,
            UserEvent::Activated(_) => self.status = UserStatus::Active,
            UserEvent::EmployeeLinked(e) => self.employee_id = e.employee_id,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::RevokeRole(cmd) => self.handle_revoke_role(cmd),
            UserCommand::GrantPermission(cmd) => self.handle_grant_permission(cmd),
            UserCommand::RevokePermission(cmd) => self.handle_revoke_permission(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
            UserCommand::LinkEmployee(cmd) => self.handle_link_employee(cmd),
        }
    }
}

impl User {
    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }
        let email = cmd.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        if cmd.initial_roles.iter().any(|r| r.as_str().trim().is_empty()) {
            return Err(DomainError::validation("role name cannot be empty"));
        }

        let mut roles: Vec<Role> = Vec::new();
        for role in &cmd.initial_roles {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }

        Ok(vec![UserEvent::Created(UserCreated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            email: email.to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            initial_roles: roles,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;
        self.ensure_not_suspended()?;

        if cmd.role.as_str().trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        if self.has_role(cmd.role.as_str()) {
            return Err(DomainError::invariant("role already assigned"));
        }

        let actor_is_admin = cmd.actor_roles.iter().any(Role::is_admin);
        let actor_holds_role = cmd.actor_roles.contains(&cmd.role);
        if !actor_is_admin && !actor_holds_role {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![UserEvent::RoleAssigned(RoleAssigned {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_role(&self, cmd: &RevokeRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if !self.has_role(cmd.role.as_str()) {
            return Err(DomainError::invariant("role not assigned"));
        }

        Ok(vec![UserEvent::RoleRevoked(RoleRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant_permission(&self, cmd: &GrantPermission) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;
        self.ensure_not_suspended()?;

        if !cmd.permission.is_known() {
            return Err(DomainError::validation(format!(
                "unknown permission '{}'",
                cmd.permission
            )));
        }
        if cmd.permission.is_wildcard() && !cmd.actor_roles.iter().any(Role::is_admin) {
            return Err(DomainError::Unauthorized);
        }
        if self.has_permission(cmd.permission.as_str()) {
            return Err(DomainError::invariant("permission already granted"));
        }

        Ok(vec![UserEvent::PermissionGranted(PermissionGranted {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_permission(
        &self,
        cmd: &RevokePermission,
    ) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if !self.has_permission(cmd.permission.as_str()) {
            return Err(DomainError::invariant("permission not granted"));
        }

        Ok(vec![UserEvent::PermissionRevoked(PermissionRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Activated(UserActivated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_employee(&self, cmd: &LinkEmployee) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.employee_id == cmd.employee_id {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::EmployeeLinked(EmployeeLinked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
