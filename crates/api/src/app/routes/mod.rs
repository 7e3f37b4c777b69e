use axum::{routing::get, Router};

use retailpos_catalog::ReferenceKind;

pub mod admin;
pub mod attendance;
pub mod common;
pub mod employees;
pub mod inventory;
pub mod parties;
pub mod payroll;
pub mod pos;
pub mod products;
pub mod purchases;
pub mod references;
pub mod reports;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/me/modules", get(system::my_modules))
        .route("/stream", get(system::stream))
        .route("/dashboard", get(system::dashboard))
        .nest("/catalog/categories", references::router(ReferenceKind::Category))
        .nest("/catalog/units", references::router(ReferenceKind::Unit))
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/customers", parties::customers_router())
        .nest("/suppliers", parties::suppliers_router())
        .nest("/employees", employees::router())
        .nest("/attendance", attendance::router())
        .nest("/payroll", payroll::router())
        .nest("/pos", pos::router())
        .nest("/purchases", purchases::router())
        .nest("/reports", reports::router())
        .nest("/admin", admin::router())
}
