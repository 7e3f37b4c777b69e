//! `retailpos-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the aggregate contract, money arithmetic and list paging.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod paging;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use paging::{Page, PageRequest, Searchable, paginate};
pub use value_object::{Discount, MAX_QUANTITY, Money, Totals, ValueObject};
