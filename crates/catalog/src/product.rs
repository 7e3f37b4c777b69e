use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retailpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use retailpos_events::Event;

use crate::reference::ReferenceId;

pub const AGGREGATE_TYPE: &str = "catalog.product";

pub const MAX_CODE_LEN: usize = 32;

/// Product identifier. Also the id of the product's stock ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Editable part of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub category_id: ReferenceId,
    pub unit_id: ReferenceId,
    /// Purchase cost per unit, used for stock valuation and profit.
    pub cost_price: Money,
    pub sale_price: Money,
    /// On-hand quantity at or below which the product counts as low stock.
    pub reorder_level: i64,
    pub description: Option<String>,
}

impl ProductDetails {
    fn validated(&self) -> Result<ProductDetails, DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.cost_price.is_negative() {
            return Err(DomainError::validation("cost price cannot be negative"));
        }
        if self.sale_price.is_negative() {
            return Err(DomainError::validation("sale price cannot be negative"));
        }
        if self.reorder_level < 0 {
            return Err(DomainError::validation("reorder level cannot be negative"));
        }
        Ok(ProductDetails {
            name: name.to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            ..self.clone()
        })
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    code: String,
    details: Option<ProductDetails>,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            details: None,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.details.as_ref()
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn can_be_sold(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub code: String,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces every editable field. The code cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    ArchiveProduct(ArchiveProduct),
    ReactivateProduct(ReactivateProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub code: String,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReactivated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductArchived(ProductArchived),
    ProductReactivated(ProductReactivated),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
            ProductEvent::ProductReactivated(e) => e.product_id,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            ProductEvent::ProductCreated(e) => e.tenant_id,
            ProductEvent::ProductUpdated(e) => e.tenant_id,
            ProductEvent::ProductArchived(e) => e.tenant_id,
            ProductEvent::ProductReactivated(e) => e.tenant_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
            ProductEvent::ProductReactivated(_) => "catalog.product.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::ProductReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.details = Some(e.details.clone());
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
            ProductEvent::ProductReactivated(_) => {
                self.status = ProductStatus::Active;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::ReactivateProduct(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let code = cmd.code.trim();
        if code.is_empty() || code.chars().count() > MAX_CODE_LEN {
            return Err(DomainError::validation(format!(
                "code must be 1 to {MAX_CODE_LEN} characters"
            )));
        }
        let details = cmd.details.validated()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            code: code.to_string(),
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("archived products cannot be updated"));
        }

        let details = cmd.details.validated()?;
        if self.details.as_ref() == Some(&details) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;
        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }

        Ok(vec![ProductEvent::ProductReactivated(ProductReactivated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn details(name: &str, cost: i64, price: i64) -> ProductDetails {
        ProductDetails {
            name: name.to_string(),
            category_id: ReferenceId::new(AggregateId::new()),
            unit_id: ReferenceId::new(AggregateId::new()),
            cost_price: Money::from_minor(cost),
            sale_price: Money::from_minor(price),
            reorder_level: 5,
            description: None,
        }
    }

    fn created(tenant_id: TenantId, product_id: ProductId) -> Product {
        let mut product = Product::empty(product_id);
        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                code: "TEA-01".to_string(),
                details: details("Green Tea", 120, 250),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            product.apply(e);
        }
        product
    }

    #[test]
    fn create_product_emits_created_event() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);

        assert_eq!(product.code(), "TEA-01");
        assert_eq!(product.details().unwrap().sale_price, Money::from_minor(250));
        assert_eq!(product.status(), ProductStatus::Active);
        assert!(product.can_be_sold());
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_rejects_bad_code() {
        let product = Product::empty(test_product_id());
        let too_long = "X".repeat(MAX_CODE_LEN + 1);
        for code in ["   ", too_long.as_str()] {
            let err = product
                .handle(&ProductCommand::CreateProduct(CreateProduct {
                    tenant_id: test_tenant_id(),
                    product_id: test_product_id(),
                    code: code.to_string(),
                    details: details("Tea", 1, 2),
                    occurred_at: test_time(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "code {code:?}");
        }
    }

    #[test]
    fn create_rejects_negative_prices_and_reorder_level() {
        let product = Product::empty(test_product_id());
        let mut bad = vec![details("Tea", -1, 2), details("Tea", 1, -2)];
        let mut negative_reorder = details("Tea", 1, 2);
        negative_reorder.reorder_level = -1;
        bad.push(negative_reorder);

        for d in bad {
            let err = product
                .handle(&ProductCommand::CreateProduct(CreateProduct {
                    tenant_id: test_tenant_id(),
                    product_id: test_product_id(),
                    code: "A1".into(),
                    details: d,
                    occurred_at: test_time(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn create_rejects_duplicate_creation() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);
        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                code: "TEA-01".into(),
                details: details("Green Tea", 120, 250),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_changes_prices() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut product = created(tenant_id, product_id);
        let mut new_details = product.details().unwrap().clone();
        new_details.sale_price = Money::from_minor(300);

        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                tenant_id,
                product_id,
                details: new_details,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            product.apply(e);
        }
        assert_eq!(product.details().unwrap().sale_price, Money::from_minor(300));
    }

    #[test]
    fn identical_update_is_a_no_op() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);
        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                tenant_id,
                product_id,
                details: product.details().unwrap().clone(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn archived_products_cannot_be_updated_or_sold() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut product = created(tenant_id, product_id);
        for e in product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id,
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            product.apply(&e);
        }
        assert!(!product.can_be_sold());

        let err = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                tenant_id,
                product_id,
                details: details("Renamed", 1, 2),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        for e in product
            .handle(&ProductCommand::ReactivateProduct(ReactivateProduct {
                tenant_id,
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap()
        {
            product.apply(&e);
        }
        assert!(product.can_be_sold());
    }

    #[test]
    fn archive_rejects_wrong_tenant() {
        let product_id = test_product_id();
        let product = created(test_tenant_id(), product_id);
        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id: test_tenant_id(),
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn archive_rejects_non_existent_product() {
        let product_id = test_product_id();
        let err = Product::empty(product_id)
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id: test_tenant_id(),
                product_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn handle_does_not_mutate_state(
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
                price in 0i64..1_000_000,
            ) {
                let tenant_id = test_tenant_id();
                let product_id = test_product_id();
                let product = created(tenant_id, product_id);
                let before = product.clone();

                let cmd = ProductCommand::UpdateProduct(UpdateProduct {
                    tenant_id,
                    product_id,
                    details: details(&name, 0, price),
                    occurred_at: test_time(),
                });
                let first = product.handle(&cmd);
                let second = product.handle(&cmd);

                prop_assert_eq!(&product, &before);
                prop_assert_eq!(first, second);
            }

            #[test]
            fn apply_is_deterministic(
                code in "[A-Z0-9]{1,32}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
            ) {
                let tenant_id = test_tenant_id();
                let product_id = test_product_id();
                let events = vec![
                    ProductEvent::ProductCreated(ProductCreated {
                        tenant_id,
                        product_id,
                        code,
                        details: details(&name, 10, 20),
                        occurred_at: test_time(),
                    }),
                    ProductEvent::ProductArchived(ProductArchived {
                        tenant_id,
                        product_id,
                        occurred_at: test_time(),
                    }),
                ];

                let mut a = Product::empty(product_id);
                let mut b = Product::empty(product_id);
                for e in &events {
                    a.apply(e);
                    b.apply(e);
                }
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.version(), 2);
                prop_assert!(!a.can_be_sold());
            }
        }
    }
}
