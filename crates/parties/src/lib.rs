//! Customers and suppliers (event-sourced).

pub mod customer_ref;
pub mod party;

pub use customer_ref::CustomerRef;
pub use party::{
    ContactInfo, Party, PartyCommand, PartyEvent, PartyId, PartyKind, PartyReactivated,
    PartyRegistered, PartyStatus, PartySuspended, PartyUpdated, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};
