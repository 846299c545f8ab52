//! In-memory implementation of the Metascan result graph store.
//!
//! Each report owns a [`slab`](crate::slab) holding its annotation and
//! data-field graphs; a second index keyed by asset supports the
//! previous-vs-new history queries. Suitable for embedding the engine in
//! tests and single-process deployments; durable backends implement the
//! same `ResultGraphStore` trait.

mod slab;

use async_trait::async_trait;
use dashmap::DashMap;
use metascan_core::{
    Annotation, AnnotationId, AnnotationStatus, AnnotationTypeInfo, AssetId, DataField,
    DataFieldId, DataFieldLink, DiscoveryError, DiscoveryReport, EngineConfig, RelatedDataField,
    ReportId, RequestStatus, Result, ResultGraphStore,
};
use slab::GraphSlab;
use tracing::debug;

struct ReportEntry {
    report: DiscoveryReport,
    history: Vec<RequestStatus>,
    slab: GraphSlab,
}

pub struct InMemoryResultGraphStore {
    annotation_types: Vec<AnnotationTypeInfo>,
    reports: DashMap<ReportId, ReportEntry>,
    asset_reports: DashMap<AssetId, Vec<ReportId>>,
}

impl InMemoryResultGraphStore {
    pub fn new() -> Self {
        Self::with_annotation_types(EngineConfig::default().annotation_types)
    }

    pub fn with_annotation_types(annotation_types: Vec<AnnotationTypeInfo>) -> Self {
        Self {
            annotation_types,
            reports: DashMap::new(),
            asset_reports: DashMap::new(),
        }
    }

    /// Full status walk of a report, in the order the transitions were
    /// applied. Implementation-specific; used by operators and tests.
    pub fn status_history(&self, report: ReportId) -> Option<Vec<RequestStatus>> {
        self.reports.get(&report).map(|e| e.history.clone())
    }

    fn entry(
        &self,
        report: ReportId,
    ) -> Result<dashmap::mapref::one::Ref<'_, ReportId, ReportEntry>> {
        self.reports
            .get(&report)
            .ok_or_else(|| DiscoveryError::not_found("discovery report", report))
    }

    fn entry_mut(
        &self,
        report: ReportId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, ReportId, ReportEntry>> {
        self.reports
            .get_mut(&report)
            .ok_or_else(|| DiscoveryError::not_found("discovery report", report))
    }

    /// Reports against `asset` that are no longer active, in creation
    /// order. The source of "previous" results.
    fn settled_reports(&self, asset: AssetId) -> Vec<ReportId> {
        let ids = self
            .asset_reports
            .get(&asset)
            .map(|v| v.clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter(|id| {
                self.reports
                    .get(id)
                    .is_some_and(|e| e.report.status.is_terminal())
            })
            .collect()
    }
}

impl Default for InMemoryResultGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultGraphStore for InMemoryResultGraphStore {
    async fn create_report(&self, caller: &str, report: DiscoveryReport) -> Result<ReportId> {
        if report.qualified_name.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter(
                "qualified_name",
                "must not be blank",
            ));
        }
        let id = report.id;
        let asset = report.asset_id;
        debug!(caller, report = %id, asset = %asset, "creating discovery report");
        let history = vec![report.status];
        self.reports.insert(
            id,
            ReportEntry {
                report,
                history,
                slab: GraphSlab::default(),
            },
        );
        self.asset_reports.entry(asset).or_default().push(id);
        Ok(id)
    }

    async fn report(&self, _caller: &str, report: ReportId) -> Result<DiscoveryReport> {
        Ok(self.entry(report)?.report.clone())
    }

    async fn update_report_status(
        &self,
        caller: &str,
        report: ReportId,
        status: RequestStatus,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        let current = entry.report.status;
        if !current.may_transition_to(status) {
            return Err(DiscoveryError::invalid_parameter(
                "status",
                format!("illegal transition {} -> {}", current, status),
            ));
        }
        if current != status {
            debug!(caller, report = %report, from = %current, to = %status, "report status");
            entry.report.status = status;
            entry.history.push(status);
        }
        Ok(())
    }

    async fn update_analysis_step(&self, caller: &str, report: ReportId, step: &str) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, step, "analysis step");
        entry.report.analysis_step = Some(step.to_string());
        Ok(())
    }

    async fn annotation_types(&self, _caller: &str) -> Result<Vec<AnnotationTypeInfo>> {
        Ok(self.annotation_types.clone())
    }

    async fn previous_annotations(
        &self,
        _caller: &str,
        asset: AssetId,
        status: Option<AnnotationStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        let mut matched = Vec::new();
        for report_id in self.settled_reports(asset) {
            let entry = self.entry(report_id)?;
            for annotation in entry.slab.annotations() {
                let keep = match status {
                    Some(wanted) => annotation.status == wanted,
                    None => annotation.status.is_reviewed(),
                };
                if keep {
                    matched.push(annotation.clone());
                }
            }
        }
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn new_annotations(
        &self,
        _caller: &str,
        report: ReportId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        Ok(self.entry(report)?.slab.annotations_page(offset, limit))
    }

    async fn extended_annotations(
        &self,
        _caller: &str,
        report: ReportId,
        parent: AnnotationId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        self.entry(report)?.slab.children_page(parent, offset, limit)
    }

    async fn annotation(
        &self,
        _caller: &str,
        report: ReportId,
        guid: AnnotationId,
    ) -> Result<Annotation> {
        self.entry(report)?.slab.annotation(guid)
    }

    async fn add_annotation_to_report(
        &self,
        caller: &str,
        report: ReportId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        let mut entry = self.entry_mut(report)?;
        let guid = entry.slab.insert_annotation(annotation, None)?;
        debug!(caller, report = %report, annotation = %guid, "annotation added to report");
        Ok(guid)
    }

    async fn add_annotation_to_annotation(
        &self,
        caller: &str,
        report: ReportId,
        parent: AnnotationId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        let mut entry = self.entry_mut(report)?;
        let guid = entry.slab.insert_annotation(annotation, Some(parent))?;
        debug!(caller, report = %report, annotation = %guid, parent = %parent, "extended annotation added");
        Ok(guid)
    }

    async fn update_annotation(
        &self,
        caller: &str,
        report: ReportId,
        annotation: Annotation,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, annotation = %annotation.id, "annotation updated");
        entry.slab.update_annotation(annotation)
    }

    async fn delete_annotation(
        &self,
        caller: &str,
        report: ReportId,
        guid: AnnotationId,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, annotation = %guid, "annotation deleted");
        entry.slab.delete_annotation(guid)
    }

    async fn previous_data_fields(
        &self,
        _caller: &str,
        asset: AssetId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        let mut matched = Vec::new();
        for report_id in self.settled_reports(asset) {
            let entry = self.entry(report_id)?;
            matched.extend(entry.slab.fields().cloned());
        }
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn new_data_fields(
        &self,
        _caller: &str,
        report: ReportId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        Ok(self.entry(report)?.slab.fields_page(offset, limit))
    }

    async fn nested_data_fields(
        &self,
        _caller: &str,
        report: ReportId,
        parent: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        self.entry(report)?
            .slab
            .nested_fields_page(parent, offset, limit)
    }

    async fn linked_data_fields(
        &self,
        _caller: &str,
        report: ReportId,
        field: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RelatedDataField>> {
        self.entry(report)?
            .slab
            .linked_fields_page(field, offset, limit)
    }

    async fn data_field(
        &self,
        _caller: &str,
        report: ReportId,
        guid: DataFieldId,
    ) -> Result<DataField> {
        self.entry(report)?.slab.data_field(guid)
    }

    async fn add_data_field_to_annotation(
        &self,
        caller: &str,
        report: ReportId,
        annotation: AnnotationId,
        field: DataField,
    ) -> Result<DataFieldId> {
        let mut entry = self.entry_mut(report)?;
        let guid = entry.slab.insert_field_for_annotation(annotation, field)?;
        debug!(caller, report = %report, field = %guid, annotation = %annotation, "data field added");
        Ok(guid)
    }

    async fn add_data_field_to_data_field(
        &self,
        caller: &str,
        report: ReportId,
        parent: DataFieldId,
        field: DataField,
    ) -> Result<DataFieldId> {
        let mut entry = self.entry_mut(report)?;
        let guid = entry.slab.insert_field(field, Some(parent))?;
        debug!(caller, report = %report, field = %guid, parent = %parent, "nested data field added");
        Ok(guid)
    }

    async fn link_data_fields(
        &self,
        caller: &str,
        report: ReportId,
        from: DataFieldId,
        link: DataFieldLink,
        to: DataFieldId,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, from = %from, to = %to, link = %link.link_type, "data fields linked");
        entry.slab.link_fields(from, link, to)
    }

    async fn add_annotation_to_data_field(
        &self,
        caller: &str,
        report: ReportId,
        field: DataFieldId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        let mut entry = self.entry_mut(report)?;
        let guid = entry.slab.attach_annotation_to_field(field, annotation)?;
        debug!(caller, report = %report, annotation = %guid, field = %field, "annotation attached to data field");
        Ok(guid)
    }

    async fn update_data_field(
        &self,
        caller: &str,
        report: ReportId,
        field: DataField,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, field = %field.id, "data field updated");
        entry.slab.update_field(field)
    }

    async fn delete_data_field(
        &self,
        caller: &str,
        report: ReportId,
        guid: DataFieldId,
    ) -> Result<()> {
        let mut entry = self.entry_mut(report)?;
        debug!(caller, report = %report, field = %guid, "data field deleted");
        entry.slab.delete_field(guid)
    }
}
