use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use retailpos_catalog::product::AGGREGATE_TYPE;
use retailpos_catalog::{ProductDetails, ProductEvent, ProductId, ProductStatus, ReferenceId};
use retailpos_core::{Money, Searchable, TenantId};
use retailpos_events::{Event, EventEnvelope};

use super::{Projection, ProjectionError, StreamCursors, decode, ensure_scope};
use crate::read_model::TenantStore;

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub category_id: ReferenceId,
    pub unit_id: ReferenceId,
    pub cost_price: Money,
    pub sale_price: Money,
    pub reorder_level: i64,
    pub description: Option<String>,
    pub status: ProductStatus,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    fn set_details(&mut self, details: ProductDetails) {
        self.name = details.name;
        self.category_id = details.category_id;
        self.unit_id = details.unit_id;
        self.cost_price = details.cost_price;
        self.sale_price = details.sale_price;
        self.reorder_level = details.reorder_level;
        self.description = details.description;
    }
}

impl Searchable for ProductReadModel {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.code.as_str(), self.name.as_str()]
    }
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    /// Every product, by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.code.cmp(&b.code)));
        rows
    }

    /// Lookup by code, ignoring case and surrounding whitespace (the till's scan path).
    pub fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Option<ProductReadModel> {
        let wanted = code.trim().to_lowercase();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|p| p.code.to_lowercase() == wanted)
    }
}

impl<S> Projection for ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    fn name(&self) -> &'static str {
        "catalog.products"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent = decode(envelope)?;
        let tenant_id = ev.tenant_id();
        let product_id = ev.product_id();
        ensure_scope(envelope, tenant_id, product_id.0)?;
        let at = ev.occurred_at();

        match ev {
            ProductEvent::ProductCreated(e) => {
                let details = e.details;
                self.store.upsert(
                    tenant_id,
                    product_id,
                    ProductReadModel {
                        product_id,
                        code: e.code,
                        name: details.name,
                        category_id: details.category_id,
                        unit_id: details.unit_id,
                        cost_price: details.cost_price,
                        sale_price: details.sale_price,
                        reorder_level: details.reorder_level,
                        description: details.description,
                        status: ProductStatus::Active,
                        updated_at: at,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &product_id) {
                    rm.set_details(e.details);
                    rm.updated_at = at;
                    self.store.upsert(tenant_id, product_id, rm);
                }
            }
            ProductEvent::ProductArchived(_) | ProductEvent::ProductReactivated(_) => {
                let status = match ev {
                    ProductEvent::ProductArchived(_) => ProductStatus::Archived,
                    _ => ProductStatus::Active,
                };
                if let Some(mut rm) = self.store.get(tenant_id, &product_id) {
                    rm.status = status;
                    rm.updated_at = at;
                    self.store.upsert(tenant_id, product_id, rm);
                }
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
