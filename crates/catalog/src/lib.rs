//! Product catalogue: products and the reference lists they point at
//! (categories and units of measure).
//!
//! Pure domain logic; code uniqueness and reference existence are checked by the caller
//! against read models before a command is dispatched.

pub mod product;
pub mod reference;

pub use product::{
    ArchiveProduct, CreateProduct, Product, ProductArchived, ProductCommand, ProductCreated,
    ProductDetails, ProductEvent, ProductId, ProductReactivated, ProductStatus, ProductUpdated,
    ReactivateProduct, UpdateProduct,
};
pub use reference::{
    ArchiveReference, CreateReference, ReferenceCommand, ReferenceEntry, ReferenceEvent,
    ReferenceId, ReferenceKind, ReferenceStatus, RenameReference, RestoreReference,
};
