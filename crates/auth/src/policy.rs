//! Built-in role policy.

use std::collections::BTreeSet;

use crate::permissions::catalog;
use crate::{Permission, Role};

fn area_permissions(areas: &[&str]) -> Vec<Permission> {
    catalog::ALL
        .iter()
        .filter(|name| areas.iter().any(|area| name.split('.').next() == Some(*area)))
        .map(|name| Permission::from_static(*name))
        .collect()
}

fn named(names: &[&'static str]) -> Vec<Permission> {
    names.iter().map(|n| Permission::from_static(*n)).collect()
}

/// Permissions granted by a role name. Unknown roles grant nothing.
pub fn role_permissions(role: &str) -> Vec<Permission> {
    match role {
        Role::ADMIN => vec![Permission::from_static(catalog::WILDCARD)],
        Role::MANAGER => catalog::ALL
            .iter()
            .filter(|name| **name != catalog::USERS_MANAGE)
            .map(|name| Permission::from_static(*name))
            .collect(),
        Role::CASHIER => named(&[
            catalog::POS_SELL,
            catalog::SALES_READ,
            catalog::CATALOG_READ,
            catalog::INVENTORY_READ,
            catalog::CUSTOMERS_READ,
            catalog::CUSTOMERS_WRITE,
        ]),
        Role::STOREKEEPER => area_permissions(&["catalog", "inventory", "suppliers", "purchases"]),
        Role::ACCOUNTANT => {
            let mut perms = named(&[
                catalog::REPORTS_READ,
                catalog::SALES_READ,
                catalog::PURCHASES_READ,
                catalog::EMPLOYEES_READ,
                catalog::ATTENDANCE_READ,
            ]);
            perms.extend(area_permissions(&["payroll"]));
            perms
        }
        _ => Vec::new(),
    }
}

/// Union of the roles' policies and directly granted permissions, sorted and deduplicated.
/// Collapses to just `*` when the wildcard is present.
pub fn effective_permissions<'a>(
    roles: impl IntoIterator<Item = &'a Role>,
    direct: impl IntoIterator<Item = &'a Permission>,
) -> Vec<Permission> {
    let mut set: BTreeSet<Permission> = BTreeSet::new();
    for role in roles {
        set.extend(role_permissions(role.as_str()));
    }
    set.extend(direct.into_iter().cloned());

    if set.iter().any(Permission::is_wildcard) {
        return vec![Permission::from_static(catalog::WILDCARD)];
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(perms: &[Permission]) -> Vec<&str> {
        perms.iter().map(Permission::as_str).collect()
    }

    #[test]
    fn admin_is_wildcard() {
        assert_eq!(names(&role_permissions("admin")), vec!["*"]);
    }

    #[test]
    fn manager_cannot_manage_users() {
        let perms = role_permissions("manager");
        assert!(!names(&perms).contains(&catalog::USERS_MANAGE));
        assert!(names(&perms).contains(&catalog::USERS_READ));
        assert_eq!(perms.len(), catalog::ALL.len() - 1);
    }

    #[test]
    fn storekeeper_covers_whole_areas() {
        let perms = role_permissions("storekeeper");
        let perms = names(&perms);
        for p in [
            catalog::CATALOG_READ,
            catalog::CATALOG_WRITE,
            catalog::INVENTORY_ADJUST,
            catalog::SUPPLIERS_WRITE,
            catalog::PURCHASES_WRITE,
        ] {
            assert!(perms.contains(&p), "storekeeper lacks {p}");
        }
        assert!(!perms.contains(&catalog::POS_SELL));
    }

    #[test]
    fn accountant_gets_payroll_but_not_selling() {
        let perms = role_permissions("accountant");
        let perms = names(&perms);
        assert!(perms.contains(&catalog::PAYROLL_PAY));
        assert!(perms.contains(&catalog::PAYROLL_PROCESS));
        assert!(perms.contains(&catalog::REPORTS_READ));
        assert!(!perms.contains(&catalog::POS_SELL));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(role_permissions("viewer").is_empty());
    }

    #[test]
    fn effective_merges_roles_and_direct_grants() {
        let roles = [Role::new("cashier")];
        let direct = [Permission::from_static(catalog::REPORTS_READ)];
        let perms = effective_permissions(&roles, &direct);
        assert!(names(&perms).contains(&catalog::REPORTS_READ));
        assert!(names(&perms).contains(&catalog::POS_SELL));

        let with_admin = [Role::new("cashier"), Role::new("admin")];
        assert_eq!(names(&effective_permissions(&with_admin, &direct)), vec!["*"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn role_name() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec!["admin", "manager", "cashier", "storekeeper", "accountant", "viewer"])
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            #[test]
            fn effective_permissions_are_sorted_and_unique(
                roles in prop::collection::vec(role_name(), 0..5),
                direct in prop::collection::vec(prop::sample::select(catalog::ALL.to_vec()), 0..5),
            ) {
                let roles: Vec<Role> = roles.into_iter().map(Role::new).collect();
                let direct: Vec<Permission> = direct.into_iter().map(Permission::from_static).collect();
                let perms = effective_permissions(&roles, &direct);

                prop_assert!(perms.windows(2).all(|w| w[0] < w[1]));
                if roles.iter().any(Role::is_admin) {
                    prop_assert_eq!(names(&perms), vec!["*"]);
                } else {
                    for p in &direct {
                        prop_assert!(perms.contains(p));
                    }
                }
            }
        }
    }
}
