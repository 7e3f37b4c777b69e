use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_auth::user::AGGREGATE_TYPE;
use retailpos_auth::{Permission, Role, UserEvent, UserStatus, effective_permissions};
use retailpos_core::{AggregateId, Searchable, TenantId, UserId};
use retailpos_events::{Event, EventEnvelope};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

/// A staff account as shown in `/admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    /// Direct grants on top of the roles.
    pub permissions: Vec<Permission>,
    /// Role policy plus direct grants.
    pub effective_permissions: Vec<Permission>,
    pub employee_id: Option<AggregateId>,
    pub status: UserStatus,
    pub updated_at: DateTime<Utc>,
}

impl UserReadModel {
    fn refresh_permissions(&mut self) {
        self.effective_permissions = effective_permissions(&self.roles, &self.permissions);
    }

    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }
}

impl Searchable for UserReadModel {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.email.as_str(), self.display_name.as_str()]
    }
}

#[derive(Debug)]
pub struct UsersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.email.cmp(&b.email));
        rows
    }

    pub fn find_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        let wanted = email.trim().to_lowercase();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|u| u.email.to_lowercase() == wanted)
    }

    fn update(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>, f: impl FnOnce(&mut UserReadModel)) {
        if let Some(mut rm) = self.store.get(tenant_id, &user_id) {
            f(&mut rm);
            rm.refresh_permissions();
            rm.updated_at = at;
            self.store.upsert(tenant_id, user_id, rm);
        }
    }
}

impl<S> Projection for UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    fn name(&self) -> &'static str {
        "auth.users"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: UserEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let user_id = ev.user_id();
        ensure_scope(envelope, tenant_id, AggregateId::from(user_id))?;
        let at = ev.occurred_at();

        match ev {
            UserEvent::Created(e) => {
                let mut rm = UserReadModel {
                    user_id,
                    email: e.email,
                    display_name: e.display_name,
                    roles: e.initial_roles,
                    permissions: Vec::new(),
                    effective_permissions: Vec::new(),
                    employee_id: None,
                    status: UserStatus::Active,
                    updated_at: at,
                };
                rm.refresh_permissions();
                self.store.upsert(tenant_id, user_id, rm);
            }
            UserEvent::RoleAssigned(e) => self.update(tenant_id, user_id, at, |rm| {
                if !rm.roles.contains(&e.role) {
                    rm.roles.push(e.role);
                }
            }),
            UserEvent::RoleRevoked(e) => self.update(tenant_id, user_id, at, |rm| rm.roles.retain(|r| r != &e.role)),
            UserEvent::PermissionGranted(e) => self.update(tenant_id, user_id, at, |rm| {
                if !rm.permissions.contains(&e.permission) {
                    rm.permissions.push(e.permission);
                }
            }),
            UserEvent::PermissionRevoked(e) => {
                self.update(tenant_id, user_id, at, |rm| rm.permissions.retain(|p| p != &e.permission))
            }
            UserEvent::Suspended(_) => self.update(tenant_id, user_id, at, |rm| rm.status = UserStatus::Suspended),
            UserEvent::Activated(_) => self.update(tenant_id, user_id, at, |rm| rm.status = UserStatus::Active),
            UserEvent::EmployeeLinked(e) => self.update(tenant_id, user_id, at, |rm| rm.employee_id = e.employee_id),
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::test_support::Feed;
    use crate::read_model::InMemoryTenantStore;
    use chrono::TimeZone;
    use retailpos_auth::permissions::catalog;
    use retailpos_auth::user::{PermissionGranted, UserCreated, UserSuspended};
    use std::sync::Arc;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
    }

    #[test]
    fn effective_permissions_combine_roles_and_grants() {
        let projection = UsersProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let user = UserId::new();
        let stream = AggregateId::from(user);

        let events = [
            UserEvent::Created(UserCreated {
                tenant_id: tenant,
                user_id: user,
                email: "till1@shop.test".into(),
                display_name: "Till One".into(),
                initial_roles: vec![Role::new(Role::CASHIER)],
                occurred_at: test_time(),
            }),
            UserEvent::PermissionGranted(PermissionGranted {
                tenant_id: tenant,
                user_id: user,
                permission: Permission::from_static(catalog::REPORTS_READ),
                occurred_at: test_time(),
            }),
        ];
        for ev in &events {
            projection
                .apply_envelope(&feed.envelope(tenant, stream, AGGREGATE_TYPE, ev))
                .unwrap();
        }

        let rm = projection.get(tenant, &user).unwrap();
        let names: Vec<&str> = rm.effective_permissions.iter().map(Permission::as_str).collect();
        assert!(names.contains(&catalog::POS_SELL));
        assert!(names.contains(&catalog::REPORTS_READ));
        assert!(!names.contains(&catalog::USERS_MANAGE));
        assert_eq!(
            projection.find_by_email(tenant, " TILL1@shop.test").map(|u| u.user_id),
            Some(user)
        );
    }

    #[test]
    fn suspension_is_visible() {
        let projection = UsersProjection::new(Arc::new(InMemoryTenantStore::new()));
        let mut feed = Feed::default();
        let tenant = test_tenant_id();
        let user = UserId::new();
        let stream = AggregateId::from(user);

        let created = UserEvent::Created(UserCreated {
            tenant_id: tenant,
            user_id: user,
            email: "temp@shop.test".into(),
            display_name: "Temp".into(),
            initial_roles: vec![],
            occurred_at: test_time(),
        });
        let suspended = UserEvent::Suspended(UserSuspended {
            tenant_id: tenant,
            user_id: user,
            reason: "contract ended".into(),
            occurred_at: test_time(),
        });
        for ev in [&created, &suspended] {
            projection
                .apply_envelope(&feed.envelope(tenant, stream, AGGREGATE_TYPE, ev))
                .unwrap();
        }
        assert!(projection.get(tenant, &user).unwrap().is_suspended());
    }
}
