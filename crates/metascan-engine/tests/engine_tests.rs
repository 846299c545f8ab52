mod support;

use async_trait::async_trait;
use metascan_core::{
    Annotation, AnnotationStatus, AssetAccess, DataField, DiscoveryContext, DiscoveryError,
    EngineConfig, MapServiceRegistry, RequestStatus, Result,
};
use metascan_engine::{AssetResolver, DiscoveryEngine, DiscoveryPipeline};
use metascan_store::InMemoryResultGraphStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use support::{MockCatalog, StubConnectorFactory};
use uuid::Uuid;

/// Writes one classification annotation anchoring a discovered table.
struct ClassifierService;

#[async_trait]
impl metascan_core::Analyzer for ClassifierService {
    async fn analyze(&self, ctx: &DiscoveryContext) -> Result<()> {
        ctx.record_analysis_step("classify").await?;
        let connector = ctx.asset_connector().await?;
        let sample = connector.read_sample(3).await?;
        let annotation = ctx
            .add_annotation(
                Annotation::new("classification")
                    .with_summary("tabular data")
                    .with_property("sampled_records", sample.len()),
            )
            .await?;
        ctx.add_data_field_to_annotation(
            annotation,
            DataField::new("customers").with_type_name("table"),
        )
        .await?;
        Ok(())
    }

    fn display_name(&self) -> &str {
        "classifier"
    }
}

/// Extends every classification written before it with a profile child.
struct ProfilerService;

#[async_trait]
impl metascan_core::Analyzer for ProfilerService {
    async fn analyze(&self, ctx: &DiscoveryContext) -> Result<()> {
        ctx.record_analysis_step("profile").await?;
        let prior = ctx.new_annotations(0, 50).await?;
        for annotation in prior
            .iter()
            .filter(|a| a.annotation_type == "classification")
        {
            ctx.add_child_annotation(
                annotation.id,
                Annotation::new("data-profile")
                    .with_summary("value distribution")
                    .with_property("distinct_ratio", 0.87),
            )
            .await?;
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        "profiler"
    }
}

struct BrokenService;

#[async_trait]
impl metascan_core::Analyzer for BrokenService {
    async fn analyze(&self, _ctx: &DiscoveryContext) -> Result<()> {
        Err(DiscoveryError::PropertyServer {
            operation: "read_schema".to_string(),
            message: "backing store offline".to_string(),
            source: None,
        })
    }

    fn display_name(&self) -> &str {
        "broken"
    }
}

fn schema_scan_engine(store: Arc<InMemoryResultGraphStore>) -> DiscoveryEngine {
    let registry = MapServiceRegistry::new();
    registry.register("schema-scan", || {
        Box::new(DiscoveryPipeline::from_analyzers(
            "schema-scan",
            vec![Box::new(ClassifierService), Box::new(ProfilerService)],
        ))
    });
    registry.register("broken-scan", || Box::new(BrokenService));
    DiscoveryEngine::new(
        EngineConfig::default(),
        store,
        Arc::new(MockCatalog::default()),
        Arc::new(StubConnectorFactory),
        Arc::new(registry),
    )
}

#[tokio::test]
async fn schema_scan_end_to_end() {
    support::init_tracing();
    let store = Arc::new(InMemoryResultGraphStore::new());
    let engine = schema_scan_engine(store.clone());
    let asset = Uuid::new_v4();

    let request = engine
        .discover_asset("tester", asset, "schema-scan")
        .await
        .unwrap();
    engine.wait_for_completion(request).await.unwrap();

    assert_eq!(
        engine.discovery_status("tester", request).await.unwrap(),
        RequestStatus::Disconnected
    );

    let report = engine.discovery_report("tester", request).await.unwrap();
    assert_eq!(report.asset_id, asset);
    assert_eq!(report.analysis_step.as_deref(), Some("profile"));
    assert_eq!(
        store.status_history(report.id).unwrap(),
        vec![
            RequestStatus::Waiting,
            RequestStatus::Activating,
            RequestStatus::InProgress,
            RequestStatus::Complete,
            RequestStatus::Disconnected,
        ]
    );

    // Both embedded services contributed to the same report.
    let annotations = engine
        .report_annotations("tester", request, 0, 50)
        .await
        .unwrap();
    assert_eq!(annotations.len(), 2);
    let classification = annotations
        .iter()
        .find(|a| a.annotation_type == "classification")
        .expect("classifier result present");
    assert_eq!(classification.status, AnnotationStatus::New);

    let children = engine
        .extended_annotations("tester", request, classification.id, 0, 50)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].annotation_type, "data-profile");
    assert_eq!(children[0].parent, Some(classification.id));
}

#[tokio::test]
async fn unregistered_request_type_is_an_engine_error() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let engine = schema_scan_engine(store);

    let err = engine
        .discover_asset("tester", Uuid::new_v4(), "sentiment-scan")
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Engine { .. }));
    assert!(err
        .find_cause(|e| matches!(e, DiscoveryError::InvalidParameter { .. }))
        .is_some());
}

#[tokio::test]
async fn failing_service_marks_report_failed_then_disconnected() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let engine = schema_scan_engine(store.clone());

    let request = engine
        .discover_asset("tester", Uuid::new_v4(), "broken-scan")
        .await
        .unwrap();
    engine.wait_for_completion(request).await.unwrap();

    let report = engine.discovery_report("tester", request).await.unwrap();
    assert_eq!(report.status, RequestStatus::Disconnected);
    assert_eq!(
        store.status_history(report.id).unwrap(),
        vec![
            RequestStatus::Waiting,
            RequestStatus::Activating,
            RequestStatus::InProgress,
            RequestStatus::Failed,
            RequestStatus::Disconnected,
        ]
    );
}

#[tokio::test]
async fn concurrent_requests_keep_reports_independent() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let engine = Arc::new(schema_scan_engine(store));

    let mut requests = Vec::new();
    for _ in 0..4 {
        let request = engine
            .discover_asset("tester", Uuid::new_v4(), "schema-scan")
            .await
            .unwrap();
        requests.push(request);
    }
    for request in &requests {
        engine.wait_for_completion(*request).await.unwrap();
        let annotations = engine
            .report_annotations("tester", *request, 0, 50)
            .await
            .unwrap();
        // Two annotations per run; nothing leaked across requests.
        assert_eq!(annotations.len(), 2);
    }
}

#[tokio::test]
async fn paging_limits_are_validated_at_the_boundary() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let engine = schema_scan_engine(store);

    let request = engine
        .discover_asset("tester", Uuid::new_v4(), "schema-scan")
        .await
        .unwrap();
    engine.wait_for_completion(request).await.unwrap();

    let err = engine
        .report_annotations("tester", request, 0, 10_000)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Engine { .. }));
    assert!(err
        .find_cause(|e| matches!(e, DiscoveryError::InvalidParameter { .. }))
        .is_some());

    // Limit 0 falls back to the configured default page size.
    let annotations = engine
        .report_annotations("tester", request, 0, 0)
        .await
        .unwrap();
    assert_eq!(annotations.len(), 2);
}

#[tokio::test]
async fn resolver_consults_the_catalog_once_per_request() {
    let catalog = Arc::new(MockCatalog::default());
    let resolver = AssetResolver::new(
        Uuid::new_v4(),
        catalog.clone(),
        Arc::new(StubConnectorFactory),
    );

    let first = resolver.connector().await.unwrap();
    let second = resolver.connector().await.unwrap();
    assert_eq!(
        first.connection().display_name,
        second.connection().display_name
    );
    assert_eq!(catalog.connection_hits.load(Ordering::SeqCst), 1);
}
