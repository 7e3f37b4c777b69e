//! Process managers: react to committed events by dispatching follow-up commands.
//!
//! Each manager splits into a pure `instructions_for(envelope)` step and a dispatch step.
//! Follow-up commands are idempotent at the target aggregate (a stock item applies a
//! document reference once, an employee is credited once per cycle), so redelivered
//! envelopes are harmless.

pub mod payroll;
pub mod stock_sync;

use serde_json::Value as JsonValue;
use thiserror::Error;

use retailpos_events::EventEnvelope;

use crate::command_dispatcher::DispatchError;
use crate::projections::ProjectionError;

pub use payroll::SalaryCrediting;
pub use stock_sync::StockSync;

/// How many times a follow-up command is retried after losing an append race.
pub const MAX_CONCURRENCY_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] ProjectionError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub trait ProcessManager: Send + Sync {
    fn name(&self) -> &'static str;

    /// React to one envelope. Returns how many follow-up commands committed events.
    fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<usize, ProcessError>;
}

/// Run `attempt` again while it fails with a stale stream version.
pub(crate) fn with_concurrency_retry<T>(
    mut attempt: impl FnMut() -> Result<T, DispatchError>,
) -> Result<T, DispatchError> {
    let mut tries = 0;
    loop {
        match attempt() {
            Err(DispatchError::Concurrency(_)) if tries < MAX_CONCURRENCY_RETRIES => tries += 1,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_concurrency_conflicts() {
        let mut calls = 0;
        let result: Result<(), _> = with_concurrency_retry(|| {
            calls += 1;
            Err(DispatchError::Concurrency("stale".into()))
        });
        assert!(matches!(result, Err(DispatchError::Concurrency(_))));
        assert_eq!(calls, MAX_CONCURRENCY_RETRIES + 1);

        let mut calls = 0;
        let result: Result<(), _> = with_concurrency_retry(|| {
            calls += 1;
            Err(DispatchError::NotFound)
        });
        assert!(matches!(result, Err(DispatchError::NotFound)));
        assert_eq!(calls, 1);
    }
}
