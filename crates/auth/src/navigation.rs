//! Which screens a principal can open, derived from their permissions.

use serde::{Deserialize, Serialize};

use crate::Permission;
use crate::permissions::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppModule {
    Dashboard,
    Pos,
    Products,
    Inventory,
    Customers,
    Suppliers,
    Employees,
    Attendance,
    Payroll,
    Sales,
    Purchases,
    Reports,
    Users,
}

impl AppModule {
    /// Menu order.
    pub const ALL: [AppModule; 13] = [
        AppModule::Dashboard,
        AppModule::Pos,
        AppModule::Products,
        AppModule::Inventory,
        AppModule::Customers,
        AppModule::Suppliers,
        AppModule::Employees,
        AppModule::Attendance,
        AppModule::Payroll,
        AppModule::Sales,
        AppModule::Purchases,
        AppModule::Reports,
        AppModule::Users,
    ];

    pub fn required_permission(self) -> &'static str {
        match self {
            AppModule::Dashboard => catalog::REPORTS_READ,
            AppModule::Pos => catalog::POS_SELL,
            AppModule::Products => catalog::CATALOG_READ,
            AppModule::Inventory => catalog::INVENTORY_READ,
            AppModule::Customers => catalog::CUSTOMERS_READ,
            AppModule::Suppliers => catalog::SUPPLIERS_READ,
            AppModule::Employees => catalog::EMPLOYEES_READ,
            AppModule::Attendance => catalog::ATTENDANCE_READ,
            AppModule::Payroll => catalog::PAYROLL_READ,
            AppModule::Sales => catalog::SALES_READ,
            AppModule::Purchases => catalog::PURCHASES_READ,
            AppModule::Reports => catalog::REPORTS_READ,
            AppModule::Users => catalog::USERS_READ,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppModule::Dashboard => "Dashboard",
            AppModule::Pos => "Point of Sale",
            AppModule::Products => "Products",
            AppModule::Inventory => "Inventory",
            AppModule::Customers => "Customers",
            AppModule::Suppliers => "Suppliers",
            AppModule::Employees => "Employees",
            AppModule::Attendance => "Attendance",
            AppModule::Payroll => "Payroll",
            AppModule::Sales => "Sales",
            AppModule::Purchases => "Purchases",
            AppModule::Reports => "Reports",
            AppModule::Users => "Users",
        }
    }
}

/// Modules unlocked by `perms`, in menu order.
pub fn accessible_modules(perms: &[Permission]) -> Vec<AppModule> {
    if perms.iter().any(Permission::is_wildcard) {
        return AppModule::ALL.to_vec();
    }
    AppModule::ALL
        .into_iter()
        .filter(|m| perms.iter().any(|p| p.as_str() == m.required_permission()))
        .collect()
}
