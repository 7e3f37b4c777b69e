//! Background consumers of the event bus.

pub mod projection_worker;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use retailpos_events::EventEnvelope;

use crate::process::ProcessManager;
use crate::projections::{Projection, ProjectionError};

pub use projection_worker::{ProjectionWorker, WorkerHandle};

/// Everything that reacts to a committed envelope: read models first, then process
/// managers, so follow-up commands see up-to-date read models.
#[derive(Clone, Default)]
pub struct EventPipeline {
    projections: Vec<Arc<dyn Projection>>,
    processes: Vec<Arc<dyn ProcessManager>>,
}

impl EventPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessManager>) -> Self {
        self.processes.push(process);
        self
    }

    /// Feed one envelope to every consumer. A failing consumer is logged and skipped.
    pub fn handle(&self, envelope: &EventEnvelope<JsonValue>) {
        for projection in &self.projections {
            if let Err(err) = projection.apply_envelope(envelope) {
                warn!(
                    projection = projection.name(),
                    aggregate_type = envelope.aggregate_type(),
                    sequence_number = envelope.sequence_number(),
                    error = %err,
                    "projection failed"
                );
            }
        }
        for process in &self.processes {
            if let Err(err) = process.handle(envelope) {
                warn!(
                    process = process.name(),
                    aggregate_type = envelope.aggregate_type(),
                    error = %err,
                    "process manager failed"
                );
            }
        }
    }

    /// Rebuild every read model from stored history. Process managers are not run:
    /// their follow-up commands are already in the history.
    pub fn warm_up(&self, history: &[EventEnvelope<JsonValue>]) -> Result<(), ProjectionError> {
        for projection in &self.projections {
            projection.rebuild_from_scratch(history)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("projections", &self.projections.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("processes", &self.processes.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}
