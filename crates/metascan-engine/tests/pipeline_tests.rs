mod support;

use metascan_core::{DiscoveryError, ServiceFault};
use metascan_engine::{DiscoveryPipeline, DiscoveryService, ServiceState};
use metascan_store::InMemoryResultGraphStore;
use parking_lot::Mutex;
use std::sync::Arc;
use support::{test_context, ScriptedAnalyzer};

#[tokio::test]
async fn pipeline_short_circuits_on_first_failure() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let ctx = test_context(store.clone()).await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let pipeline = DiscoveryPipeline::from_analyzers(
        "schema-scan",
        vec![
            ScriptedAnalyzer::succeeding("s1", log.clone()),
            ScriptedAnalyzer::failing("s2", log.clone()),
            ScriptedAnalyzer::succeeding("s3", log.clone()),
        ],
    );
    let service = DiscoveryService::new(Box::new(pipeline));
    service.set_context(ctx.clone()).unwrap();
    let err = service.start().await.unwrap_err();

    // s1 ran to completion, s2 ran up to its failure, s3 never started.
    assert_eq!(*log.lock(), vec!["s1".to_string(), "s2".to_string()]);

    // The cause chain names the failed child and keeps its root error.
    let root = err
        .find_cause(|e| matches!(e, DiscoveryError::InvalidParameter { .. }))
        .expect("root cause preserved");
    assert!(root.to_string().contains("s2 exploded"));
    assert!(err
        .find_cause(|e| matches!(
            e,
            DiscoveryError::Service {
                service,
                fault: ServiceFault::Failed,
                ..
            } if service == "s2"
        ))
        .is_some());

    // s1's results are still pooled in the shared store.
    let annotations = ctx.new_annotations(0, 10).await.unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].summary.as_deref(), Some("s1"));
}

#[tokio::test]
async fn empty_pipeline_is_rejected() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let ctx = test_context(store).await;

    let pipeline = DiscoveryPipeline::new("hollow", Vec::new());
    let service = DiscoveryService::new(Box::new(pipeline));
    service.set_context(ctx).unwrap();
    let err = service.start().await.unwrap_err();

    assert!(err
        .find_cause(|e| matches!(
            e,
            DiscoveryError::Service {
                fault: ServiceFault::NoEmbeddedServices,
                service,
                ..
            } if service == "hollow"
        ))
        .is_some());
}

#[tokio::test]
async fn start_without_context_fails() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let service = DiscoveryService::new(ScriptedAnalyzer::succeeding("lonely", log.clone()));

    let err = service.start().await.unwrap_err();
    assert!(matches!(
        err,
        DiscoveryError::Service {
            fault: ServiceFault::NullContext,
            ..
        }
    ));
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn context_cannot_change_after_start() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let ctx = test_context(store.clone()).await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let service = DiscoveryService::new(ScriptedAnalyzer::succeeding("once", log));
    service.set_context(ctx.clone()).unwrap();
    service.start().await.unwrap();

    let late = test_context(store).await;
    let err = service.set_context(late).unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidParameter { .. }));

    service.disconnect().await.unwrap();
    assert_eq!(service.state(), ServiceState::Terminated);
    // A second disconnect is a harmless no-op.
    service.disconnect().await.unwrap();
}

#[tokio::test]
async fn concurrent_set_context_installs_exactly_one() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let ctx_a = test_context(store.clone()).await;
    let ctx_b = test_context(store.clone()).await;
    let report_a = ctx_a.report_id();
    let report_b = ctx_b.report_id();
    let log = Arc::new(Mutex::new(Vec::new()));

    let service = Arc::new(DiscoveryService::new(ScriptedAnalyzer::succeeding(
        "contended",
        log,
    )));

    let (a, b) = {
        let (sa, sb) = (service.clone(), service.clone());
        tokio::join!(
            tokio::spawn(async move { sa.set_context(ctx_a) }),
            tokio::spawn(async move { sb.set_context(ctx_b) }),
        )
    };
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    // Exactly one of the two contexts won, whole; repeated reads agree.
    let first = service.context().expect("context installed");
    let second = service.context().expect("context readable");
    assert!(first.report_id() == report_a || first.report_id() == report_b);
    assert_eq!(first.report_id(), second.report_id());
    assert_eq!(first.caller(), second.caller());
}

#[tokio::test]
async fn restricted_context_blocks_filtered_annotation_types() {
    let store = Arc::new(InMemoryResultGraphStore::new());
    let ctx = test_context(store).await;

    let narrowed = ctx.restricted(vec!["data-profile".to_string()]);
    let err = narrowed
        .add_annotation(metascan_core::Annotation::new("schema-analysis"))
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidParameter { .. }));

    narrowed
        .add_annotation(metascan_core::Annotation::new("data-profile"))
        .await
        .unwrap();
    // Results written through the clone are visible to the original.
    assert_eq!(ctx.new_annotations(0, 10).await.unwrap().len(), 1);
}
