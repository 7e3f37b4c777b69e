use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission name, `<area>.<action>` (e.g. `"pos.sell"`). `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == catalog::WILDCARD
    }

    /// Area prefix (`"payroll"` for `"payroll.pay"`).
    pub fn area(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }

    pub fn is_known(&self) -> bool {
        self.is_wildcard() || catalog::ALL.contains(&self.as_str())
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every permission the service checks.
pub mod catalog {
    pub const WILDCARD: &str = "*";

    pub const CATALOG_READ: &str = "catalog.read";
    pub const CATALOG_WRITE: &str = "catalog.write";
    pub const INVENTORY_READ: &str = "inventory.read";
    pub const INVENTORY_ADJUST: &str = "inventory.adjust";
    pub const CUSTOMERS_READ: &str = "customers.read";
    pub const CUSTOMERS_WRITE: &str = "customers.write";
    pub const SUPPLIERS_READ: &str = "suppliers.read";
    pub const SUPPLIERS_WRITE: &str = "suppliers.write";
    pub const EMPLOYEES_READ: &str = "employees.read";
    pub const EMPLOYEES_WRITE: &str = "employees.write";
    pub const ATTENDANCE_READ: &str = "attendance.read";
    pub const ATTENDANCE_MARK: &str = "attendance.mark";
    pub const PAYROLL_READ: &str = "payroll.read";
    pub const PAYROLL_PROCESS: &str = "payroll.process";
    pub const PAYROLL_PAY: &str = "payroll.pay";
    pub const POS_SELL: &str = "pos.sell";
    pub const SALES_READ: &str = "sales.read";
    pub const SALES_CANCEL: &str = "sales.cancel";
    pub const PURCHASES_READ: &str = "purchases.read";
    pub const PURCHASES_WRITE: &str = "purchases.write";
    pub const REPORTS_READ: &str = "reports.read";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_MANAGE: &str = "users.manage";

    pub const ALL: &[&str] = &[
        CATALOG_READ,
        CATALOG_WRITE,
        INVENTORY_READ,
        INVENTORY_ADJUST,
        CUSTOMERS_READ,
        CUSTOMERS_WRITE,
        SUPPLIERS_READ,
        SUPPLIERS_WRITE,
        EMPLOYEES_READ,
        EMPLOYEES_WRITE,
        ATTENDANCE_READ,
        ATTENDANCE_MARK,
        PAYROLL_READ,
        PAYROLL_PROCESS,
        PAYROLL_PAY,
        POS_SELL,
        SALES_READ,
        SALES_CANCEL,
        PURCHASES_READ,
        PURCHASES_WRITE,
        REPORTS_READ,
        USERS_READ,
        USERS_MANAGE,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_names_are_unique_and_dotted() {
        let mut seen = std::collections::HashSet::new();
        for name in catalog::ALL {
            assert!(seen.insert(*name), "duplicate permission {name}");
            assert_eq!(name.split('.').count(), 2, "{name} is not <area>.<action>");
        }
    }

    #[test]
    fn known_permissions() {
        assert!(Permission::from_static(catalog::POS_SELL).is_known());
        assert!(Permission::new("*").is_known());
        assert!(!Permission::new("pos.refund").is_known());
        assert_eq!(Permission::from_static(catalog::PAYROLL_PAY).area(), "payroll");
    }
}
