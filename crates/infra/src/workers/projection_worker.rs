use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use retailpos_core::TenantId;
use retailpos_events::{EventBus, EventEnvelope, Subscription};

/// Handle to stop and join a background worker. Dropping it also stops the worker,
/// without waiting for it.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background loop that feeds bus envelopes to a handler.
///
/// The subscription is taken before the thread starts, so nothing published after
/// `spawn` returns is missed. Handlers must tolerate redelivery.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// `tenant_id`: when set, envelopes of other tenants are skipped.
    pub fn spawn<B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
        H: FnMut(EventEnvelope<JsonValue>) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;
        info!(worker = name, "worker started");

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<H, E>(
    name: &'static str,
    sub: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    H: FnMut(EventEnvelope<JsonValue>) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(100);

    loop {
        // An explicit request or a dropped handle both stop the loop.
        if !matches!(shutdown_rx.try_recv(), Err(mpsc::TryRecvError::Empty)) {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(env) => {
                if tenant_id.is_some_and(|t| env.tenant_id() != t) {
                    continue;
                }
                if let Err(err) = handler(env) {
                    warn!(worker = name, error = ?err, "worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use retailpos_core::AggregateId;
    use retailpos_events::InMemoryEventBus;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, AggregateId::new(), "test.stream", 1, JsonValue::Null)
    }

    #[test]
    fn worker_filters_by_tenant_and_stops() {
        let bus = InMemoryEventBus::<EventEnvelope<JsonValue>>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shop = TenantId::new();

        let sink = seen.clone();
        let handle = ProjectionWorker::spawn("test-worker", &bus, Some(shop), move |env| {
            sink.lock().unwrap().push(env.tenant_id());
            Ok::<(), ()>(())
        })
        .unwrap();

        bus.publish(envelope(TenantId::new())).unwrap();
        bus.publish(envelope(shop)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![shop]);
    }
}
