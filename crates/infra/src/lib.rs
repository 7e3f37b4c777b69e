//! Infrastructure layer: event storage, command dispatch, read models, process managers,
//! reports and background workers.

pub mod command_dispatcher;
pub mod event_store;
pub mod process;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod workers;
