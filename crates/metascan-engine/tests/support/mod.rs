#![allow(dead_code)]

use async_trait::async_trait;
use metascan_core::{
    Annotation, AnnotationTypeInfo, AssetAccess, AssetConnector, AssetId, CatalogQuery,
    ConnectionDescriptor, ConnectorFactory, DiscoveryContext, DiscoveryError, DiscoveryReport,
    Result, ResultGraphStore,
};
use metascan_engine::AssetResolver;
use metascan_store::InMemoryResultGraphStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Installs a fmt subscriber once per test binary; later calls no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Catalog stub that serves the same in-memory connection document for
/// every asset and counts how often it is consulted.
#[derive(Default)]
pub struct MockCatalog {
    pub connection_hits: AtomicUsize,
}

#[async_trait]
impl CatalogQuery for MockCatalog {
    async fn connection_for_asset(&self, _asset: AssetId) -> Result<ConnectionDescriptor> {
        self.connection_hits.fetch_add(1, Ordering::SeqCst);
        Ok(ConnectionDescriptor::new("test asset connection", "memory-connector")
            .with_endpoint("mem://assets"))
    }

    async fn annotation_types(&self) -> Result<Vec<AnnotationTypeInfo>> {
        Ok(vec![
            AnnotationTypeInfo::new("schema-analysis", "structure"),
            AnnotationTypeInfo::new("classification", "semantics"),
            AnnotationTypeInfo::new("data-profile", "statistics"),
        ])
    }

    async fn validate_annotation_type(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }
}

pub struct StubConnector {
    connection: ConnectionDescriptor,
}

#[async_trait]
impl AssetConnector for StubConnector {
    fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    async fn read_sample(&self, max_records: usize) -> Result<Vec<serde_json::Value>> {
        Ok((0..max_records.min(3))
            .map(|i| serde_json::json!({ "row": i }))
            .collect())
    }
}

#[derive(Default)]
pub struct StubConnectorFactory;

impl ConnectorFactory for StubConnectorFactory {
    fn create(&self, connection: &ConnectionDescriptor) -> Result<Box<dyn AssetConnector>> {
        Ok(Box::new(StubConnector {
            connection: connection.clone(),
        }))
    }
}

/// Analyzer that records its invocation, optionally fails, and otherwise
/// writes one annotation so result pooling can be observed.
pub struct ScriptedAnalyzer {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl ScriptedAnalyzer {
    pub fn succeeding(name: &str, log: Arc<Mutex<Vec<String>>>) -> Box<Self> {
        Box::new(Self {
            name: name.to_string(),
            log,
            fail: false,
        })
    }

    pub fn failing(name: &str, log: Arc<Mutex<Vec<String>>>) -> Box<Self> {
        Box::new(Self {
            name: name.to_string(),
            log,
            fail: true,
        })
    }
}

#[async_trait]
impl metascan_core::Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, ctx: &DiscoveryContext) -> Result<()> {
        self.log.lock().push(self.name.clone());
        if self.fail {
            return Err(DiscoveryError::invalid_parameter(
                "sample",
                format!("{} exploded", self.name),
            ));
        }
        ctx.add_annotation(Annotation::new("schema-analysis").with_summary(self.name.clone()))
            .await?;
        Ok(())
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// A context wired to an in-memory store with a fresh report, for tests
/// that exercise services and pipelines without the engine.
pub async fn test_context(store: Arc<InMemoryResultGraphStore>) -> DiscoveryContext {
    let asset = Uuid::new_v4();
    let report = store
        .create_report(
            "tester",
            DiscoveryReport::new(format!("report:{}", asset), "pipeline test", asset),
        )
        .await
        .unwrap();
    let catalog = Arc::new(MockCatalog::default());
    let resolver = Arc::new(AssetResolver::new(
        asset,
        catalog.clone(),
        Arc::new(StubConnectorFactory),
    ));
    DiscoveryContext::new(
        "tester",
        asset,
        report,
        Default::default(),
        None,
        store,
        catalog,
        resolver as Arc<dyn AssetAccess>,
    )
}
