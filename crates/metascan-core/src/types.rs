use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type AssetId = Uuid;
pub type ReportId = Uuid;
pub type RequestId = Uuid;
pub type AnnotationId = Uuid;
pub type DataFieldId = Uuid;

/// Lifecycle of a discovery request / report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Waiting,
    Activating,
    InProgress,
    WaitingToComplete,
    Complete,
    Failed,
    Disconnected,
    Other,
}

impl RequestStatus {
    fn rank(self) -> u8 {
        match self {
            RequestStatus::Waiting => 0,
            RequestStatus::Activating => 1,
            RequestStatus::InProgress => 2,
            RequestStatus::WaitingToComplete => 3,
            RequestStatus::Complete | RequestStatus::Failed => 4,
            RequestStatus::Disconnected => 5,
            RequestStatus::Other => 6,
        }
    }

    /// Transitions are monotonic. Complete and Failed are terminal except
    /// for the final Disconnected step; Disconnected accepts nothing.
    /// Other ranks past Disconnected, so it can be entered from an active
    /// state but never offers a way back.
    pub fn may_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Complete, Disconnected) | (Failed, Disconnected) => true,
            (Complete, _) | (Failed, _) | (Disconnected, _) => false,
            _ => self.rank() < next.rank(),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Complete | RequestStatus::Failed | RequestStatus::Disconnected
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Waiting => "waiting",
            RequestStatus::Activating => "activating",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::WaitingToComplete => "waiting_to_complete",
            RequestStatus::Complete => "complete",
            RequestStatus::Failed => "failed",
            RequestStatus::Disconnected => "disconnected",
            RequestStatus::Other => "other",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(RequestStatus::Waiting),
            "activating" => Ok(RequestStatus::Activating),
            "in_progress" => Ok(RequestStatus::InProgress),
            "waiting_to_complete" => Ok(RequestStatus::WaitingToComplete),
            "complete" => Ok(RequestStatus::Complete),
            "failed" => Ok(RequestStatus::Failed),
            "disconnected" => Ok(RequestStatus::Disconnected),
            _ => Ok(RequestStatus::Other),
        }
    }
}

/// Review lifecycle of an individual annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationStatus {
    New,
    Reviewed,
    Approved,
    Actioned,
    Invalid,
    Ignored,
    Unknown,
}

impl AnnotationStatus {
    /// Statuses that count as "passed review" for cross-run history queries.
    pub fn is_reviewed(self) -> bool {
        matches!(
            self,
            AnnotationStatus::Reviewed | AnnotationStatus::Approved | AnnotationStatus::Actioned
        )
    }
}

impl fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnnotationStatus::New => "new",
            AnnotationStatus::Reviewed => "reviewed",
            AnnotationStatus::Approved => "approved",
            AnnotationStatus::Actioned => "actioned",
            AnnotationStatus::Invalid => "invalid",
            AnnotationStatus::Ignored => "ignored",
            AnnotationStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Per-request container anchoring all annotations and data fields
/// produced by one discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub id: ReportId,
    pub qualified_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub asset_id: AssetId,
    pub status: RequestStatus,
    pub analysis_step: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DiscoveryReport {
    pub fn new(qualified_name: impl Into<String>, display_name: impl Into<String>, asset_id: AssetId) -> Self {
        Self {
            id: Uuid::new_v4(),
            qualified_name: qualified_name.into(),
            display_name: display_name.into(),
            description: None,
            asset_id,
            status: RequestStatus::Waiting,
            analysis_step: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A structured finding, attached to the report, to another annotation
/// (nesting), or to a data field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub annotation_type: String,
    pub status: AnnotationStatus,
    pub summary: Option<String>,
    pub properties: Map<String, Value>,
    /// Parent annotation for extended (nested) annotations. Assigned by
    /// the store on insert; never updatable afterwards.
    pub parent: Option<AnnotationId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Annotation {
    pub fn new(annotation_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            annotation_type: annotation_type.into(),
            status: AnnotationStatus::New,
            summary: None,
            properties: Map::new(),
            parent: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_status(mut self, status: AnnotationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A discovered schema element. Nesting forms a forest; peer links may
/// form an arbitrary graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataField {
    pub id: DataFieldId,
    pub name: String,
    pub type_name: Option<String>,
    pub properties: Map<String, Value>,
    /// Parent data field for nested fields. Assigned by the store on
    /// insert; never updatable afterwards.
    pub parent: Option<DataFieldId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DataField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            type_name: None,
            properties: Map::new(),
            parent: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A typed, optionally directed peer relationship between two data fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFieldLink {
    pub link_type: String,
    pub directed: bool,
    pub properties: Map<String, Value>,
}

impl DataFieldLink {
    pub fn new(link_type: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            directed: false,
            properties: Map::new(),
        }
    }

    pub fn directed(mut self) -> Self {
        self.directed = true;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Role the *other* field plays in a peer link, seen from the queried field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkEnd {
    From,
    To,
}

/// One peer edge of a data field, as returned by linked-field queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedDataField {
    pub link: DataFieldLink,
    /// Which end of the link the related field occupies.
    pub end: LinkEnd,
    pub field: DataField,
}

/// An annotation kind supported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationTypeInfo {
    pub name: String,
    pub description: String,
}

impl AnnotationTypeInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Connection document describing how to reach an asset's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub id: Uuid,
    pub display_name: String,
    pub connector_provider: String,
    pub endpoint: Option<String>,
    pub configuration: Map<String, Value>,
}

impl ConnectionDescriptor {
    pub fn new(display_name: impl Into<String>, connector_provider: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            connector_provider: connector_provider.into(),
            endpoint: None,
            configuration: Map::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}
