//! Credits employee salary accounts when a salary cycle is processed.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use retailpos_events::{EventBus, EventEnvelope};
use retailpos_hr::{CreditSalary, Employee, EmployeeCommand, SalaryCycleEvent};

use super::{ProcessError, ProcessManager, with_concurrency_retry};
use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::decode;

pub fn instructions_for(envelope: &EventEnvelope<JsonValue>) -> Result<Vec<CreditSalary>, ProcessError> {
    if envelope.aggregate_type() != retailpos_hr::salary_cycle::AGGREGATE_TYPE {
        return Ok(vec![]);
    }
    let SalaryCycleEvent::Processed(e) = decode::<SalaryCycleEvent>(envelope)?;
    Ok(e.credits
        .iter()
        .map(|credit| CreditSalary {
            tenant_id: e.tenant_id,
            employee_id: credit.employee_id,
            cycle_id: e.cycle_id,
            period: e.period,
            amount: credit.amount,
            occurred_at: e.occurred_at,
        })
        .collect())
}

pub struct SalaryCrediting<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> SalaryCrediting<S, B> {
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> ProcessManager for SalaryCrediting<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "salary_crediting"
    }

    fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<usize, ProcessError> {
        let mut committed = 0;
        for credit in instructions_for(envelope)? {
            let employee_id = credit.employee_id;
            let events = with_concurrency_retry(|| {
                self.dispatcher.dispatch(
                    credit.tenant_id,
                    employee_id.0,
                    retailpos_hr::employee::AGGREGATE_TYPE,
                    EmployeeCommand::CreditSalary(credit.clone()),
                    |_, _| Employee::empty(employee_id),
                )
            })?;
            if events.is_empty() {
                debug!(employee_id = %employee_id, cycle_id = %credit.cycle_id, "salary already credited");
            } else {
                committed += 1;
            }
        }
        Ok(committed)
    }
}
