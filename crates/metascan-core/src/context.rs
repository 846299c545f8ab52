use crate::error::{DiscoveryError, Result};
use crate::traits::{AssetAccess, AssetConnector, CatalogQuery, ResultGraphStore};
use crate::types::{
    Annotation, AnnotationId, AnnotationStatus, AnnotationTypeInfo, AssetId, DataField,
    DataFieldId, DataFieldLink, RelatedDataField, ReportId, RequestStatus,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The per-request exchange object threaded through a discovery run.
///
/// Cheap to clone; clones share the same underlying stores, so results
/// written through any clone pool into the same report. A pipeline hands
/// each embedded service a clone, optionally narrowed with
/// [`DiscoveryContext::restricted`].
#[derive(Clone)]
pub struct DiscoveryContext {
    caller: Arc<str>,
    asset: AssetId,
    report: ReportId,
    parameters: Arc<HashMap<String, String>>,
    /// Annotation types this context may create. `None` means all.
    type_filter: Option<Arc<Vec<String>>>,
    store: Arc<dyn ResultGraphStore>,
    catalog: Arc<dyn CatalogQuery>,
    asset_access: Arc<dyn AssetAccess>,
}

impl DiscoveryContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: impl Into<String>,
        asset: AssetId,
        report: ReportId,
        parameters: HashMap<String, String>,
        type_filter: Option<Vec<String>>,
        store: Arc<dyn ResultGraphStore>,
        catalog: Arc<dyn CatalogQuery>,
        asset_access: Arc<dyn AssetAccess>,
    ) -> Self {
        Self {
            caller: caller.into().into(),
            asset,
            report,
            parameters: Arc::new(parameters),
            type_filter: type_filter.map(Arc::new),
            store,
            catalog,
            asset_access,
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset
    }

    pub fn report_id(&self) -> ReportId {
        self.report
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn annotation_type_filter(&self) -> Option<&[String]> {
        self.type_filter.as_deref().map(Vec::as_slice)
    }

    pub fn store(&self) -> &Arc<dyn ResultGraphStore> {
        &self.store
    }

    /// A clone of this context whose annotation-creation rights are
    /// narrowed to the given types. The underlying stores are shared.
    pub fn restricted(&self, type_filter: Vec<String>) -> Self {
        let mut clone = self.clone();
        clone.type_filter = Some(Arc::new(type_filter));
        clone
    }

    fn check_type_allowed(&self, annotation_type: &str) -> Result<()> {
        if let Some(filter) = &self.type_filter {
            if !filter.iter().any(|t| t == annotation_type) {
                return Err(DiscoveryError::invalid_parameter(
                    "annotation_type",
                    format!(
                        "annotation type {} is outside this context's filter",
                        annotation_type
                    ),
                ));
            }
        }
        Ok(())
    }

    // Asset access.

    pub async fn asset_connector(&self) -> Result<Box<dyn AssetConnector>> {
        self.asset_access.connector().await
    }

    // Report progress.

    pub async fn record_analysis_step(&self, step: &str) -> Result<()> {
        self.store
            .update_analysis_step(&self.caller, self.report, step)
            .await
    }

    /// Used by choreography overrides, e.g. to enter WaitingToComplete
    /// while a slow embedded service runs.
    pub async fn record_status(&self, status: RequestStatus) -> Result<()> {
        self.store
            .update_report_status(&self.caller, self.report, status)
            .await
    }

    // Annotation graph, scoped to this report.

    pub async fn annotation_types(&self) -> Result<Vec<AnnotationTypeInfo>> {
        self.catalog.annotation_types().await
    }

    pub async fn add_annotation(&self, annotation: Annotation) -> Result<AnnotationId> {
        self.check_type_allowed(&annotation.annotation_type)?;
        self.store
            .add_annotation_to_report(&self.caller, self.report, annotation)
            .await
    }

    pub async fn add_child_annotation(
        &self,
        parent: AnnotationId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        self.check_type_allowed(&annotation.annotation_type)?;
        self.store
            .add_annotation_to_annotation(&self.caller, self.report, parent, annotation)
            .await
    }

    pub async fn add_annotation_to_data_field(
        &self,
        field: DataFieldId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        self.check_type_allowed(&annotation.annotation_type)?;
        self.store
            .add_annotation_to_data_field(&self.caller, self.report, field, annotation)
            .await
    }

    pub async fn annotation(&self, guid: AnnotationId) -> Result<Annotation> {
        self.store.annotation(&self.caller, self.report, guid).await
    }

    pub async fn new_annotations(&self, offset: usize, limit: usize) -> Result<Vec<Annotation>> {
        self.store
            .new_annotations(&self.caller, self.report, offset, limit)
            .await
    }

    pub async fn previous_annotations(
        &self,
        status: Option<AnnotationStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        self.store
            .previous_annotations(&self.caller, self.asset, status, offset, limit)
            .await
    }

    pub async fn extended_annotations(
        &self,
        parent: AnnotationId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        self.store
            .extended_annotations(&self.caller, self.report, parent, offset, limit)
            .await
    }

    pub async fn update_annotation(&self, annotation: Annotation) -> Result<()> {
        self.store
            .update_annotation(&self.caller, self.report, annotation)
            .await
    }

    pub async fn delete_annotation(&self, guid: AnnotationId) -> Result<()> {
        self.store
            .delete_annotation(&self.caller, self.report, guid)
            .await
    }

    // Data-field graph, scoped to this report.

    pub async fn add_data_field_to_annotation(
        &self,
        annotation: AnnotationId,
        field: DataField,
    ) -> Result<DataFieldId> {
        self.store
            .add_data_field_to_annotation(&self.caller, self.report, annotation, field)
            .await
    }

    pub async fn add_nested_data_field(
        &self,
        parent: DataFieldId,
        field: DataField,
    ) -> Result<DataFieldId> {
        self.store
            .add_data_field_to_data_field(&self.caller, self.report, parent, field)
            .await
    }

    pub async fn link_data_fields(
        &self,
        from: DataFieldId,
        link: DataFieldLink,
        to: DataFieldId,
    ) -> Result<()> {
        self.store
            .link_data_fields(&self.caller, self.report, from, link, to)
            .await
    }

    pub async fn data_field(&self, guid: DataFieldId) -> Result<DataField> {
        self.store.data_field(&self.caller, self.report, guid).await
    }

    pub async fn new_data_fields(&self, offset: usize, limit: usize) -> Result<Vec<DataField>> {
        self.store
            .new_data_fields(&self.caller, self.report, offset, limit)
            .await
    }

    pub async fn previous_data_fields(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        self.store
            .previous_data_fields(&self.caller, self.asset, offset, limit)
            .await
    }

    pub async fn nested_data_fields(
        &self,
        parent: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        self.store
            .nested_data_fields(&self.caller, self.report, parent, offset, limit)
            .await
    }

    pub async fn linked_data_fields(
        &self,
        field: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RelatedDataField>> {
        self.store
            .linked_data_fields(&self.caller, self.report, field, offset, limit)
            .await
    }

    pub async fn update_data_field(&self, field: DataField) -> Result<()> {
        self.store
            .update_data_field(&self.caller, self.report, field)
            .await
    }

    pub async fn delete_data_field(&self, guid: DataFieldId) -> Result<()> {
        self.store
            .delete_data_field(&self.caller, self.report, guid)
            .await
    }
}

impl std::fmt::Debug for DiscoveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("caller", &self.caller)
            .field("asset", &self.asset)
            .field("report", &self.report)
            .field("type_filter", &self.type_filter)
            .finish_non_exhaustive()
    }
}
