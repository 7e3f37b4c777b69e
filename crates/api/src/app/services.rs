use std::{convert::Infallible, sync::Arc, time::Duration};

use anyhow::Context;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tracing::{info, warn};

use retailpos_auth::{AuthzError, CommandAuthorization, Principal};
use retailpos_catalog::{ProductId, ReferenceId};
use retailpos_core::{Aggregate, AggregateId, DomainError, TenantId, UserId};
use retailpos_events::{EventEnvelope, InMemoryEventBus};
use retailpos_hr::EmployeeId;
use retailpos_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    process::{SalaryCrediting, StockSync},
    projections::{
        AttendanceProjection, AttendanceReadModel, EmployeeReadModel, EmployeesProjection,
        PartiesProjection, PartyReadModel, ProductCatalogProjection, ProductReadModel,
        PurchaseReadModel, PurchasesProjection, ReferenceReadModel, ReferencesProjection,
        SalaryCycleReadModel, SalaryCyclesProjection, SaleReadModel, SalesProjection,
        StockProjection, StockReadModel, UserReadModel, UsersProjection, parties::PartyDocument,
    },
    read_model::InMemoryTenantStore,
    reports::PrintLayout,
    workers::{EventPipeline, ProjectionWorker, WorkerHandle},
};
use retailpos_parties::PartyId;
use retailpos_purchasing::PurchaseId;
use retailpos_sales::SaleId;

use crate::app::errors::ApiError;
use crate::authz;
use crate::config::{ApiConfig, StoreBackend};
use crate::context::{PrincipalContext, TenantContext};

pub type SharedStore = Arc<dyn EventStore>;
pub type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<SharedStore, SharedBus>;

type Mem<K, V> = Arc<InMemoryTenantStore<K, V>>;

fn mem<K, V>() -> Mem<K, V> {
    Arc::new(InMemoryTenantStore::new())
}

/// Realtime message broadcast via SSE after the read side has caught up with an event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: JsonValue,
}

/// Everything a handler needs: the command path and the read models.
pub struct AppServices {
    pub dispatcher: Arc<Dispatcher>,
    pub references: Arc<ReferencesProjection<Mem<ReferenceId, ReferenceReadModel>>>,
    pub products: Arc<ProductCatalogProjection<Mem<ProductId, ProductReadModel>>>,
    pub stock: Arc<StockProjection<Mem<ProductId, StockReadModel>>>,
    pub parties: Arc<PartiesProjection<Mem<PartyId, PartyReadModel>, Mem<AggregateId, PartyDocument>>>,
    pub employees: Arc<EmployeesProjection<Mem<EmployeeId, EmployeeReadModel>>>,
    pub attendance: Arc<AttendanceProjection<Mem<AggregateId, AttendanceReadModel>>>,
    pub salary_cycles: Arc<SalaryCyclesProjection<Mem<AggregateId, SalaryCycleReadModel>>>,
    pub sales: Arc<SalesProjection<Mem<SaleId, SaleReadModel>>>,
    pub purchases: Arc<PurchasesProjection<Mem<PurchaseId, PurchaseReadModel>>>,
    pub users: Arc<UsersProjection<Mem<UserId, UserReadModel>>>,
    pub layout: PrintLayout,
    pub default_page_size: u32,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    _worker: WorkerHandle,
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match config.store_backend {
        StoreBackend::Memory => Arc::new(InMemoryEventStore::new()),
        StoreBackend::Postgres => postgres_store(config).await?,
    };
    AppServices::wire(store, config)
}

#[cfg(feature = "postgres")]
async fn postgres_store(config: &ApiConfig) -> anyhow::Result<SharedStore> {
    use retailpos_infra::event_store::PostgresEventStore;

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?;
    let store = PostgresEventStore::connect(url).await?;
    store.migrate().await?;
    info!("using postgres event store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_store(_config: &ApiConfig) -> anyhow::Result<SharedStore> {
    warn!("STORE_BACKEND=postgres but the postgres feature is not enabled, falling back to in-memory");
    Ok(Arc::new(InMemoryEventStore::new()))
}

impl AppServices {
    fn wire(store: SharedStore, config: &ApiConfig) -> anyhow::Result<Self> {
        let bus: SharedBus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

        let references: Arc<ReferencesProjection<Mem<ReferenceId, ReferenceReadModel>>> =
            Arc::new(ReferencesProjection::new(mem()));
        let products: Arc<ProductCatalogProjection<Mem<ProductId, ProductReadModel>>> =
            Arc::new(ProductCatalogProjection::new(mem()));
        let stock: Arc<StockProjection<Mem<ProductId, StockReadModel>>> = Arc::new(StockProjection::new(mem()));
        let parties: Arc<PartiesProjection<Mem<PartyId, PartyReadModel>, Mem<AggregateId, PartyDocument>>> =
            Arc::new(PartiesProjection::new(mem(), mem()));
        let employees: Arc<EmployeesProjection<Mem<EmployeeId, EmployeeReadModel>>> =
            Arc::new(EmployeesProjection::new(mem()));
        let attendance: Arc<AttendanceProjection<Mem<AggregateId, AttendanceReadModel>>> =
            Arc::new(AttendanceProjection::new(mem()));
        let salary_cycles: Arc<SalaryCyclesProjection<Mem<AggregateId, SalaryCycleReadModel>>> =
            Arc::new(SalaryCyclesProjection::new(mem()));
        let sales: Arc<SalesProjection<Mem<SaleId, SaleReadModel>>> = Arc::new(SalesProjection::new(mem()));
        let purchases: Arc<PurchasesProjection<Mem<PurchaseId, PurchaseReadModel>>> =
            Arc::new(PurchasesProjection::new(mem()));
        let users: Arc<UsersProjection<Mem<UserId, UserReadModel>>> = Arc::new(UsersProjection::new(mem()));

        let pipeline = EventPipeline::new()
            .with_projection(references.clone())
            .with_projection(products.clone())
            .with_projection(stock.clone())
            .with_projection(parties.clone())
            .with_projection(employees.clone())
            .with_projection(attendance.clone())
            .with_projection(salary_cycles.clone())
            .with_projection(sales.clone())
            .with_projection(purchases.clone())
            .with_projection(users.clone())
            .with_process(Arc::new(StockSync::new(dispatcher.clone())))
            .with_process(Arc::new(SalaryCrediting::new(dispatcher.clone())));

        let history: Vec<_> = store
            .load_all()
            .context("failed to load event history")?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();
        pipeline.warm_up(&history).context("failed to rebuild read models")?;
        info!(events = history.len(), "read models rebuilt from history");

        // Lossy broadcast, tenant-filtered in the SSE handler.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

        let worker = {
            let realtime_tx = realtime_tx.clone();
            ProjectionWorker::spawn("retailpos-read-side", &bus, None, move |env| {
                pipeline.handle(&env);
                let _ = realtime_tx.send(RealtimeMessage {
                    tenant_id: env.tenant_id(),
                    topic: format!("{}.updated", env.aggregate_type()),
                    payload: serde_json::json!({
                        "kind": "projection_update",
                        "aggregate_type": env.aggregate_type(),
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                    }),
                });
                Ok::<(), Infallible>(())
            })
            .context("failed to start read-side worker")?
        };

        Ok(Self {
            dispatcher,
            references,
            products,
            stock,
            parties,
            employees,
            attendance,
            salary_cycles,
            sales,
            purchases,
            users,
            layout: config.layout.clone(),
            default_page_size: config.default_page_size,
            realtime_tx,
            _worker: worker,
        })
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// The caller's user record, if one was created for their login.
    pub fn user_record(&self, tenant: &TenantContext, principal: &PrincipalContext) -> Option<UserReadModel> {
        self.users.get(tenant.tenant_id(), &principal.user_id())
    }

    /// Authorize `command` for the caller. Returns the resolved principal.
    pub fn guard<C: CommandAuthorization>(
        &self,
        tenant: &TenantContext,
        principal: &PrincipalContext,
        command: &C,
    ) -> Result<Principal, ApiError> {
        let record = self.user_record(tenant, principal);
        authz::authorize_command(tenant, principal, record.as_ref(), command).map_err(ApiError::from)
    }

    pub fn resolve(&self, tenant: &TenantContext, principal: &PrincipalContext) -> Result<Principal, AuthzError> {
        let record = self.user_record(tenant, principal);
        authz::resolve_principal(tenant, principal, record.as_ref())
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: retailpos_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
