use crate::audit::TracingAuditLog;
use crate::resolver::AssetResolver;
use crate::service::DiscoveryService;
use dashmap::DashMap;
use metascan_core::{
    Annotation, AnnotationId, AssetAccess, AssetId, AuditLog, CatalogQuery, ConnectorFactory,
    DiscoveryContext, DiscoveryError, DiscoveryReport, EngineConfig, ReportId, RequestId,
    RequestStatus, Result, ResultGraphStore, ServiceRegistry,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

struct RequestHandle {
    report: ReportId,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// The orchestration boundary: accepts discovery requests, runs the
/// registered service for the asset's request type as a tracked tokio
/// task, and exposes status and result retrieval.
///
/// Every failure observed at this boundary is wrapped into
/// [`DiscoveryError::Engine`] with the original cause preserved, so
/// callers have a single failure surface.
pub struct DiscoveryEngine {
    config: EngineConfig,
    store: Arc<dyn ResultGraphStore>,
    catalog: Arc<dyn CatalogQuery>,
    connectors: Arc<dyn ConnectorFactory>,
    registry: Arc<dyn ServiceRegistry>,
    audit: Arc<dyn AuditLog>,
    requests: DashMap<RequestId, RequestHandle>,
}

impl DiscoveryEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ResultGraphStore>,
        catalog: Arc<dyn CatalogQuery>,
        connectors: Arc<dyn ConnectorFactory>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            connectors,
            registry,
            audit: Arc::new(TracingAuditLog),
            requests: DashMap::new(),
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn engine_name(&self) -> &str {
        &self.config.engine_name
    }

    /// Starts a discovery run against `asset` using the service
    /// registered for `request_type`, returning a request id immediately.
    /// The analysis itself runs on a spawned task; poll
    /// [`discovery_status`](Self::discovery_status) for completion.
    pub async fn discover_asset(
        &self,
        caller: &str,
        asset: AssetId,
        request_type: &str,
    ) -> Result<RequestId> {
        self.discover_asset_with_options(caller, asset, request_type, HashMap::new(), None)
            .await
    }

    pub async fn discover_asset_with_options(
        &self,
        caller: &str,
        asset: AssetId,
        request_type: &str,
        parameters: HashMap<String, String>,
        annotation_type_filter: Option<Vec<String>>,
    ) -> Result<RequestId> {
        let factory = self.registry.resolve(request_type).ok_or_else(|| {
            DiscoveryError::invalid_parameter(
                "request_type",
                format!("no discovery service registered for {}", request_type),
            )
            .at_engine("discover_asset")
        })?;

        let resolver = Arc::new(AssetResolver::new(
            asset,
            self.catalog.clone(),
            self.connectors.clone(),
        ));
        // Unresolvable assets are rejected before the request is accepted.
        resolver
            .connection()
            .await
            .map_err(|e| e.at_engine("discover_asset"))?;

        let report = DiscoveryReport::new(
            format!("{}:{}:{}", self.config.engine_name, request_type, asset),
            format!("{} discovery of {}", request_type, asset),
            asset,
        );
        let report_id = self
            .store
            .create_report(caller, report)
            .await
            .map_err(|e| e.at_engine("discover_asset"))?;

        let ctx = DiscoveryContext::new(
            caller,
            asset,
            report_id,
            parameters,
            annotation_type_filter,
            self.store.clone(),
            self.catalog.clone(),
            resolver as Arc<dyn AssetAccess>,
        );

        let request_id = Uuid::new_v4();
        let service = DiscoveryService::new(factory());
        info!(
            request = %request_id,
            asset = %asset,
            request_type,
            service = %service.name(),
            "discovery request accepted"
        );
        self.audit.record(request_id, "discovery request accepted");

        let task = tokio::spawn(run_request(
            request_id,
            report_id,
            service,
            ctx,
            self.store.clone(),
            self.audit.clone(),
        ));
        self.requests.insert(
            request_id,
            RequestHandle {
                report: report_id,
                task: Mutex::new(Some(task)),
            },
        );
        Ok(request_id)
    }

    fn report_id(&self, request: RequestId) -> Result<ReportId> {
        self.requests
            .get(&request)
            .map(|h| h.report)
            .ok_or_else(|| {
                DiscoveryError::not_found("discovery request", request)
                    .at_engine("unknown discovery request")
            })
    }

    /// Current lifecycle state of a request. Never blocks on the run.
    pub async fn discovery_status(&self, caller: &str, request: RequestId) -> Result<RequestStatus> {
        let report = self.discovery_report(caller, request).await?;
        Ok(report.status)
    }

    pub async fn discovery_report(
        &self,
        caller: &str,
        request: RequestId,
    ) -> Result<DiscoveryReport> {
        let report = self.report_id(request)?;
        self.store
            .report(caller, report)
            .await
            .map_err(|e| e.at_engine("discovery_report"))
    }

    /// Annotations written by the request's discovery run.
    pub async fn report_annotations(
        &self,
        caller: &str,
        request: RequestId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        let limit = self
            .config
            .check_paging(limit)
            .map_err(|e| e.at_engine("report_annotations"))?;
        let report = self.report_id(request)?;
        self.store
            .new_annotations(caller, report, offset, limit)
            .await
            .map_err(|e| e.at_engine("report_annotations"))
    }

    pub async fn extended_annotations(
        &self,
        caller: &str,
        request: RequestId,
        parent: AnnotationId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        let limit = self
            .config
            .check_paging(limit)
            .map_err(|e| e.at_engine("extended_annotations"))?;
        let report = self.report_id(request)?;
        self.store
            .extended_annotations(caller, report, parent, offset, limit)
            .await
            .map_err(|e| e.at_engine("extended_annotations"))
    }

    pub async fn annotation(
        &self,
        caller: &str,
        request: RequestId,
        guid: AnnotationId,
    ) -> Result<Annotation> {
        let report = self.report_id(request)?;
        self.store
            .annotation(caller, report, guid)
            .await
            .map_err(|e| e.at_engine("annotation"))
    }

    /// Awaits the spawned run of a request. Completion covers both
    /// success and failure; inspect the status afterwards.
    pub async fn wait_for_completion(&self, request: RequestId) -> Result<()> {
        let task = {
            let handle = self.requests.get(&request).ok_or_else(|| {
                DiscoveryError::not_found("discovery request", request)
                    .at_engine("unknown discovery request")
            })?;
            // The guard must drop before the map ref does.
            let task = handle.task.lock().take();
            task
        };
        if let Some(task) = task {
            task.await.map_err(|e| DiscoveryError::Engine {
                message: "discovery task aborted".to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// One discovery run: drives the report through its status walk while
/// the service executes, and releases everything at the end. Runs
/// detached; outcomes are visible through the report.
async fn run_request(
    request: RequestId,
    report: ReportId,
    service: DiscoveryService,
    ctx: DiscoveryContext,
    store: Arc<dyn ResultGraphStore>,
    audit: Arc<dyn AuditLog>,
) {
    let caller = ctx.caller().to_string();
    set_status(&store, &caller, report, RequestStatus::Activating).await;
    if let Err(e) = service.set_context(ctx) {
        error!(request = %request, error = %e, "failed to attach discovery context");
        set_status(&store, &caller, report, RequestStatus::Failed).await;
        set_status(&store, &caller, report, RequestStatus::Disconnected).await;
        return;
    }
    set_status(&store, &caller, report, RequestStatus::InProgress).await;

    match service.start().await {
        Ok(()) => {
            audit.record(request, "discovery run complete");
            set_status(&store, &caller, report, RequestStatus::Complete).await;
        }
        Err(e) => {
            audit.record(request, &format!("discovery run failed: {}", e));
            error!(request = %request, error = %e, "discovery run failed");
            set_status(&store, &caller, report, RequestStatus::Failed).await;
        }
    }

    if let Err(e) = service.disconnect().await {
        error!(request = %request, error = %e, "service disconnect failed");
    }
    set_status(&store, &caller, report, RequestStatus::Disconnected).await;
}

async fn set_status(
    store: &Arc<dyn ResultGraphStore>,
    caller: &str,
    report: ReportId,
    status: RequestStatus,
) {
    if let Err(e) = store.update_report_status(caller, report, status).await {
        error!(report = %report, status = %status, error = %e, "status update failed");
    }
}
