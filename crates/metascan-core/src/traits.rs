use crate::context::DiscoveryContext;
use crate::error::Result;
use crate::types::{
    Annotation, AnnotationId, AnnotationStatus, AnnotationTypeInfo, AssetId, ConnectionDescriptor,
    DataField, DataFieldId, DataFieldLink, DiscoveryReport, RelatedDataField, ReportId,
    RequestId, RequestStatus,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Durable, paged access to the annotation and data-field graphs of
/// discovery reports, plus cross-run history per asset.
///
/// Paging is offset+limit over a stable, implementation-defined order:
/// full pagination returns every item exactly once provided no writes
/// occur during iteration.
#[async_trait]
pub trait ResultGraphStore: Send + Sync {
    // Report lifecycle.
    async fn create_report(&self, caller: &str, report: DiscoveryReport) -> Result<ReportId>;
    async fn report(&self, caller: &str, report: ReportId) -> Result<DiscoveryReport>;
    async fn update_report_status(
        &self,
        caller: &str,
        report: ReportId,
        status: RequestStatus,
    ) -> Result<()>;
    async fn update_analysis_step(&self, caller: &str, report: ReportId, step: &str) -> Result<()>;

    /// Annotation kinds the store knows about, with descriptions.
    async fn annotation_types(&self, caller: &str) -> Result<Vec<AnnotationTypeInfo>>;

    // Annotation graph.

    /// Annotations from prior, no-longer-active reports against the same
    /// asset. A `None` status returns only annotations that have passed
    /// review (reviewed, approved or actioned).
    async fn previous_annotations(
        &self,
        caller: &str,
        asset: AssetId,
        status: Option<AnnotationStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>>;
    /// Annotations created in the given (current) report.
    async fn new_annotations(
        &self,
        caller: &str,
        report: ReportId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>>;
    /// Children of a given annotation.
    async fn extended_annotations(
        &self,
        caller: &str,
        report: ReportId,
        parent: AnnotationId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>>;
    async fn annotation(
        &self,
        caller: &str,
        report: ReportId,
        guid: AnnotationId,
    ) -> Result<Annotation>;
    async fn add_annotation_to_report(
        &self,
        caller: &str,
        report: ReportId,
        annotation: Annotation,
    ) -> Result<AnnotationId>;
    async fn add_annotation_to_annotation(
        &self,
        caller: &str,
        report: ReportId,
        parent: AnnotationId,
        annotation: Annotation,
    ) -> Result<AnnotationId>;
    /// Full replace by GUID; the stored parent link and creation time are
    /// preserved.
    async fn update_annotation(
        &self,
        caller: &str,
        report: ReportId,
        annotation: Annotation,
    ) -> Result<()>;
    async fn delete_annotation(
        &self,
        caller: &str,
        report: ReportId,
        guid: AnnotationId,
    ) -> Result<()>;

    // Data-field graph.
    async fn previous_data_fields(
        &self,
        caller: &str,
        asset: AssetId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>>;
    async fn new_data_fields(
        &self,
        caller: &str,
        report: ReportId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>>;
    async fn nested_data_fields(
        &self,
        caller: &str,
        report: ReportId,
        parent: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>>;
    /// Peer edges of a data field, with the role the other end plays.
    async fn linked_data_fields(
        &self,
        caller: &str,
        report: ReportId,
        field: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RelatedDataField>>;
    async fn data_field(
        &self,
        caller: &str,
        report: ReportId,
        guid: DataFieldId,
    ) -> Result<DataField>;
    /// Creates a data field keyed off an annotation (the report-level
    /// entry point into the data-field graph).
    async fn add_data_field_to_annotation(
        &self,
        caller: &str,
        report: ReportId,
        annotation: AnnotationId,
        field: DataField,
    ) -> Result<DataFieldId>;
    async fn add_data_field_to_data_field(
        &self,
        caller: &str,
        report: ReportId,
        parent: DataFieldId,
        field: DataField,
    ) -> Result<DataFieldId>;
    async fn link_data_fields(
        &self,
        caller: &str,
        report: ReportId,
        from: DataFieldId,
        link: DataFieldLink,
        to: DataFieldId,
    ) -> Result<()>;
    /// Attaches an annotation to a data field.
    async fn add_annotation_to_data_field(
        &self,
        caller: &str,
        report: ReportId,
        field: DataFieldId,
        annotation: Annotation,
    ) -> Result<AnnotationId>;
    async fn update_data_field(
        &self,
        caller: &str,
        report: ReportId,
        field: DataField,
    ) -> Result<()>;
    async fn delete_data_field(
        &self,
        caller: &str,
        report: ReportId,
        guid: DataFieldId,
    ) -> Result<()>;
}

/// The unit of analysis: consumes a discovery context, performs its
/// analysis and leaves results in the result graph store. Leaf analyzers
/// and pipelines both implement this; there is no inheritance hierarchy.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, ctx: &DiscoveryContext) -> Result<()>;

    /// Releases resources held by the analyzer. Default is a no-op.
    async fn release(&self) -> Result<()> {
        Ok(())
    }

    fn display_name(&self) -> &str;
}

/// Asset-catalog collaborator: resolves assets to connection documents
/// and validates annotation kinds against the schema registry.
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    async fn connection_for_asset(&self, asset: AssetId) -> Result<ConnectionDescriptor>;
    async fn annotation_types(&self) -> Result<Vec<AnnotationTypeInfo>>;
    async fn validate_annotation_type(&self, name: &str) -> Result<bool>;
}

/// A live data-access connector for one asset. The analysis surface is
/// opaque to the engine; only analyzers interpret what comes back.
#[async_trait]
pub trait AssetConnector: Send + Sync {
    fn connection(&self) -> &ConnectionDescriptor;
    async fn read_sample(&self, max_records: usize) -> Result<Vec<serde_json::Value>>;
}

/// Collaborator that turns a connection document into a live connector.
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, connection: &ConnectionDescriptor) -> Result<Box<dyn AssetConnector>>;
}

/// Per-request asset access handle. The concrete resolver caches the
/// connection document so the catalog is consulted at most once per
/// discovery request.
#[async_trait]
pub trait AssetAccess: Send + Sync {
    async fn connection(&self) -> Result<ConnectionDescriptor>;
    async fn connector(&self) -> Result<Box<dyn AssetConnector>>;
}

/// Fire-and-forget diagnostic sink. The engine calls it but never
/// depends on it.
pub trait AuditLog: Send + Sync {
    fn record(&self, request: RequestId, message: &str);
}

pub type AnalyzerFactory = Arc<dyn Fn() -> Box<dyn Analyzer> + Send + Sync>;

/// Maps a request type to the analyzer that serves it. Registration and
/// persistence of these mappings live outside the core; the engine only
/// needs the lookup.
pub trait ServiceRegistry: Send + Sync {
    fn resolve(&self, request_type: &str) -> Option<AnalyzerFactory>;
}

/// In-memory registry for embedding the engine directly.
#[derive(Default)]
pub struct MapServiceRegistry {
    services: DashMap<String, AnalyzerFactory>,
}

impl MapServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, request_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Analyzer> + Send + Sync + 'static,
    {
        self.services.insert(request_type.into(), Arc::new(factory));
    }
}

impl ServiceRegistry for MapServiceRegistry {
    fn resolve(&self, request_type: &str) -> Option<AnalyzerFactory> {
        self.services.get(request_type).map(|f| f.value().clone())
    }
}
