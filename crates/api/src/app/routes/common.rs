use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use retailpos_auth::{CommandAuthorization, Permission, Principal};
use retailpos_core::{AggregateId, MAX_QUANTITY, Page, PageRequest, Searchable, paginate};
use retailpos_infra::reports::{DateRange, ReportDocument, month_of, render_html};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Pairs a command with the permission it needs.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, permission: &'static str) -> Self {
        Self {
            inner,
            required: vec![Permission::from_static(permission)],
        }
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Guard a read endpoint.
pub fn require(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<Principal, ApiError> {
    services.guard(tenant, principal, &CmdAuth::new((), permission))
}

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id(what))
}

/// Reject quantities outside what a single line or movement may carry.
pub fn bounded_quantity(quantity: i64) -> Result<i64, ApiError> {
    if quantity.unsigned_abs() > MAX_QUANTITY.unsigned_abs() {
        return Err(ApiError::validation(format!("quantity cannot exceed {MAX_QUANTITY}")));
    }
    Ok(quantity)
}

/// Response for a committed command.
pub fn committed(status: StatusCode, id: impl ToString, events: usize) -> Response {
    (
        status,
        Json(serde_json::json!({
            "id": id.to_string(),
            "events_committed": events,
        })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self, default_per_page: u32) -> PageRequest {
        PageRequest::new(self.page, self.per_page, self.search.clone(), default_per_page)
    }
}

pub fn page_of<T: Searchable>(items: Vec<T>, query: &ListQuery, services: &AppServices) -> Page<T> {
    paginate(items, &query.page_request(services.default_page_size))
}

pub fn page_json<T: Serialize>(page: Page<T>) -> Response {
    (StatusCode::OK, Json(page)).into_response()
}

/// `?from=&to=` with an optional `?format=html`. Missing bounds default to the current month.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub format: Option<String>,
}

impl RangeQuery {
    pub fn range(&self) -> Result<DateRange, ApiError> {
        let month = month_of(Utc::now().date_naive());
        Ok(DateRange::new(self.from.unwrap_or(month.from), self.to.unwrap_or(month.to))?)
    }

    pub fn wants_html(&self) -> bool {
        wants_html(self.format.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

pub fn wants_html(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("html"))
}

/// JSON by default, the printable page when HTML was asked for.
pub fn printable<T: Serialize>(
    services: &AppServices,
    html: bool,
    value: &T,
    document: impl FnOnce(&T) -> ReportDocument,
) -> Response {
    if html {
        Html(render_html(&document(value), &services.layout)).into_response()
    } else {
        (StatusCode::OK, Json(value)).into_response()
    }
}
