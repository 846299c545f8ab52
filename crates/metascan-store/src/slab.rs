use metascan_core::{
    Annotation, AnnotationId, DataField, DataFieldId, DataFieldLink, DiscoveryError, LinkEnd,
    RelatedDataField, Result,
};
use std::collections::{BTreeMap, HashMap};

pub(crate) struct LinkRecord {
    pub from: DataFieldId,
    pub to: DataFieldId,
    pub link: DataFieldLink,
}

/// The result graph of one report: insertion-ordered annotation and
/// data-field tables, peer links, and the cross-links between the two
/// graphs. The insertion sequence provides the stable paging order.
#[derive(Default)]
pub(crate) struct GraphSlab {
    next_seq: u64,
    annotations: BTreeMap<u64, Annotation>,
    annotation_seq: HashMap<AnnotationId, u64>,
    data_fields: BTreeMap<u64, DataField>,
    field_seq: HashMap<DataFieldId, u64>,
    links: Vec<LinkRecord>,
    /// Data fields keyed off an annotation (the report-level anchor).
    annotation_fields: HashMap<AnnotationId, Vec<DataFieldId>>,
    /// Annotations attached to a data field.
    field_annotations: HashMap<DataFieldId, Vec<AnnotationId>>,
}

fn page<'a, T: Clone + 'a>(
    items: impl Iterator<Item = &'a T>,
    offset: usize,
    limit: usize,
) -> Vec<T> {
    items.skip(offset).take(limit).cloned().collect()
}

impl GraphSlab {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn has_annotation(&self, guid: AnnotationId) -> bool {
        self.annotation_seq.contains_key(&guid)
    }

    pub fn has_field(&self, guid: DataFieldId) -> bool {
        self.field_seq.contains_key(&guid)
    }

    /// Inserts an annotation, overriding its parent link with the anchor
    /// chosen by the calling operation. Parents are fixed at insert, so
    /// parent chains cannot form cycles.
    pub fn insert_annotation(
        &mut self,
        mut annotation: Annotation,
        parent: Option<AnnotationId>,
    ) -> Result<AnnotationId> {
        if annotation.annotation_type.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter(
                "annotation_type",
                "must not be blank",
            ));
        }
        if let Some(parent) = parent {
            if !self.has_annotation(parent) {
                return Err(DiscoveryError::invalid_parameter(
                    "parent",
                    format!("annotation {} does not exist in this report", parent),
                ));
            }
        }
        annotation.parent = parent;
        // Identity is owned by the store: caller-supplied ids are replaced.
        let guid = uuid::Uuid::new_v4();
        annotation.id = guid;
        let seq = self.take_seq();
        self.annotation_seq.insert(guid, seq);
        self.annotations.insert(seq, annotation);
        Ok(guid)
    }

    pub fn attach_annotation_to_field(
        &mut self,
        field: DataFieldId,
        annotation: Annotation,
    ) -> Result<AnnotationId> {
        if !self.has_field(field) {
            return Err(DiscoveryError::invalid_parameter(
                "field",
                format!("data field {} does not exist in this report", field),
            ));
        }
        let guid = self.insert_annotation(annotation, None)?;
        self.field_annotations.entry(field).or_default().push(guid);
        Ok(guid)
    }

    pub fn annotation(&self, guid: AnnotationId) -> Result<Annotation> {
        self.annotation_seq
            .get(&guid)
            .and_then(|seq| self.annotations.get(seq))
            .cloned()
            .ok_or_else(|| DiscoveryError::not_found("annotation", guid))
    }

    pub fn annotations_page(&self, offset: usize, limit: usize) -> Vec<Annotation> {
        page(self.annotations.values(), offset, limit)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn children_page(
        &self,
        parent: AnnotationId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Annotation>> {
        if !self.has_annotation(parent) {
            return Err(DiscoveryError::not_found("annotation", parent));
        }
        Ok(page(
            self.annotations.values().filter(|a| a.parent == Some(parent)),
            offset,
            limit,
        ))
    }

    /// Full replace of type, status, summary and properties. The stored
    /// parent link, creation time and paging position are preserved.
    pub fn update_annotation(&mut self, annotation: Annotation) -> Result<()> {
        if annotation.annotation_type.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter(
                "annotation_type",
                "must not be blank",
            ));
        }
        let seq = *self
            .annotation_seq
            .get(&annotation.id)
            .ok_or_else(|| DiscoveryError::not_found("annotation", annotation.id))?;
        let stored = self.annotations.get_mut(&seq).expect("seq index consistent");
        stored.annotation_type = annotation.annotation_type;
        stored.status = annotation.status;
        stored.summary = annotation.summary;
        stored.properties = annotation.properties;
        Ok(())
    }

    /// Deletes are not cascading: an annotation that still has child
    /// annotations or attached data fields is rejected.
    pub fn delete_annotation(&mut self, guid: AnnotationId) -> Result<()> {
        let seq = *self
            .annotation_seq
            .get(&guid)
            .ok_or_else(|| DiscoveryError::not_found("annotation", guid))?;
        if self.annotations.values().any(|a| a.parent == Some(guid)) {
            return Err(DiscoveryError::invalid_parameter(
                "annotation",
                format!("annotation {} still has child annotations", guid),
            ));
        }
        if self
            .annotation_fields
            .get(&guid)
            .is_some_and(|fields| !fields.is_empty())
        {
            return Err(DiscoveryError::invalid_parameter(
                "annotation",
                format!("annotation {} still anchors data fields", guid),
            ));
        }
        self.annotations.remove(&seq);
        self.annotation_seq.remove(&guid);
        self.annotation_fields.remove(&guid);
        for anchored in self.field_annotations.values_mut() {
            anchored.retain(|a| *a != guid);
        }
        Ok(())
    }

    pub fn insert_field_for_annotation(
        &mut self,
        annotation: AnnotationId,
        field: DataField,
    ) -> Result<DataFieldId> {
        if !self.has_annotation(annotation) {
            return Err(DiscoveryError::invalid_parameter(
                "annotation",
                format!("annotation {} does not exist in this report", annotation),
            ));
        }
        let guid = self.insert_field(field, None)?;
        self.annotation_fields
            .entry(annotation)
            .or_default()
            .push(guid);
        Ok(guid)
    }

    pub fn insert_field(
        &mut self,
        mut field: DataField,
        parent: Option<DataFieldId>,
    ) -> Result<DataFieldId> {
        if field.name.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter("name", "must not be blank"));
        }
        if let Some(parent) = parent {
            if !self.has_field(parent) {
                return Err(DiscoveryError::invalid_parameter(
                    "parent",
                    format!("data field {} does not exist in this report", parent),
                ));
            }
        }
        field.parent = parent;
        let guid = uuid::Uuid::new_v4();
        field.id = guid;
        let seq = self.take_seq();
        self.field_seq.insert(guid, seq);
        self.data_fields.insert(seq, field);
        Ok(guid)
    }

    pub fn data_field(&self, guid: DataFieldId) -> Result<DataField> {
        self.field_seq
            .get(&guid)
            .and_then(|seq| self.data_fields.get(seq))
            .cloned()
            .ok_or_else(|| DiscoveryError::not_found("data field", guid))
    }

    pub fn fields_page(&self, offset: usize, limit: usize) -> Vec<DataField> {
        page(self.data_fields.values(), offset, limit)
    }

    pub fn fields(&self) -> impl Iterator<Item = &DataField> {
        self.data_fields.values()
    }

    pub fn nested_fields_page(
        &self,
        parent: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DataField>> {
        if !self.has_field(parent) {
            return Err(DiscoveryError::not_found("data field", parent));
        }
        Ok(page(
            self.data_fields.values().filter(|f| f.parent == Some(parent)),
            offset,
            limit,
        ))
    }

    pub fn link_fields(
        &mut self,
        from: DataFieldId,
        link: DataFieldLink,
        to: DataFieldId,
    ) -> Result<()> {
        if !self.has_field(from) {
            return Err(DiscoveryError::invalid_parameter(
                "from",
                format!("data field {} does not exist in this report", from),
            ));
        }
        if !self.has_field(to) {
            return Err(DiscoveryError::invalid_parameter(
                "to",
                format!("data field {} does not exist in this report", to),
            ));
        }
        if link.link_type.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter(
                "link_type",
                "must not be blank",
            ));
        }
        self.links.push(LinkRecord { from, to, link });
        Ok(())
    }

    /// Peer edges touching `field`, in link creation order. Each entry
    /// carries the field at the other end and the role it plays.
    pub fn linked_fields_page(
        &self,
        field: DataFieldId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RelatedDataField>> {
        if !self.has_field(field) {
            return Err(DiscoveryError::not_found("data field", field));
        }
        let mut related = Vec::new();
        for record in &self.links {
            if record.from == field {
                related.push(RelatedDataField {
                    link: record.link.clone(),
                    end: LinkEnd::To,
                    field: self.data_field(record.to)?,
                });
            } else if record.to == field {
                related.push(RelatedDataField {
                    link: record.link.clone(),
                    end: LinkEnd::From,
                    field: self.data_field(record.from)?,
                });
            }
        }
        Ok(related.into_iter().skip(offset).take(limit).collect())
    }

    pub fn update_field(&mut self, field: DataField) -> Result<()> {
        if field.name.trim().is_empty() {
            return Err(DiscoveryError::invalid_parameter("name", "must not be blank"));
        }
        let seq = *self
            .field_seq
            .get(&field.id)
            .ok_or_else(|| DiscoveryError::not_found("data field", field.id))?;
        let stored = self.data_fields.get_mut(&seq).expect("seq index consistent");
        stored.name = field.name;
        stored.type_name = field.type_name;
        stored.properties = field.properties;
        Ok(())
    }

    /// Same no-cascade policy as annotations; peer links to the deleted
    /// field are removed with it.
    pub fn delete_field(&mut self, guid: DataFieldId) -> Result<()> {
        let seq = *self
            .field_seq
            .get(&guid)
            .ok_or_else(|| DiscoveryError::not_found("data field", guid))?;
        if self.data_fields.values().any(|f| f.parent == Some(guid)) {
            return Err(DiscoveryError::invalid_parameter(
                "field",
                format!("data field {} still has nested fields", guid),
            ));
        }
        if self
            .field_annotations
            .get(&guid)
            .is_some_and(|anns| !anns.is_empty())
        {
            return Err(DiscoveryError::invalid_parameter(
                "field",
                format!("data field {} still has attached annotations", guid),
            ));
        }
        self.data_fields.remove(&seq);
        self.field_seq.remove(&guid);
        self.field_annotations.remove(&guid);
        self.links.retain(|l| l.from != guid && l.to != guid);
        for anchored in self.annotation_fields.values_mut() {
            anchored.retain(|f| *f != guid);
        }
        Ok(())
    }
}
