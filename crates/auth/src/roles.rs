use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role name carried in tokens and on user records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const MANAGER: &'static str = "manager";
    pub const CASHIER: &'static str = "cashier";
    pub const STOREKEEPER: &'static str = "storekeeper";
    pub const ACCOUNTANT: &'static str = "accountant";

    /// Built-in roles in display order.
    pub const BUILT_IN: &'static [&'static str] = &[
        Self::ADMIN,
        Self::MANAGER,
        Self::CASHIER,
        Self::STOREKEEPER,
        Self::ACCOUNTANT,
    ];

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
