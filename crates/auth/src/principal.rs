use serde::{Deserialize, Serialize};

use retailpos_core::TenantId;

use crate::{Permission, Role};

/// What a principal holds inside one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    /// Effective permissions (role policy already expanded).
    pub permissions: Vec<Permission>,
}
