use crate::types::AssetId;
use std::fmt;
use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Service-level precondition violations and runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFault {
    /// `start()` was called before a context was attached.
    NullContext,
    /// A pipeline has no embedded services to run.
    NoEmbeddedServices,
    /// The service's analysis failed.
    Failed,
}

impl fmt::Display for ServiceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceFault::NullContext => "no discovery context attached",
            ServiceFault::NoEmbeddedServices => "no embedded discovery services",
            ServiceFault::Failed => "analysis failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("user {user} is not authorized to {operation}")]
    UserNotAuthorized { user: String, operation: String },

    #[error("property server failure during {operation}: {message}")]
    PropertyServer {
        operation: String,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("connector failure for asset {asset}: {message}")]
    Connector {
        asset: AssetId,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("discovery service {service}: {fault}")]
    Service {
        service: String,
        fault: ServiceFault,
        #[source]
        source: Option<Cause>,
    },

    #[error("{entity} {guid} not found")]
    NotFound { entity: &'static str, guid: String },

    #[error("discovery engine failure: {message}")]
    Engine {
        message: String,
        #[source]
        source: Cause,
    },
}

impl DiscoveryError {
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        DiscoveryError::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, guid: impl ToString) -> Self {
        DiscoveryError::NotFound {
            entity,
            guid: guid.to_string(),
        }
    }

    pub fn service(service: impl Into<String>, fault: ServiceFault) -> Self {
        DiscoveryError::Service {
            service: service.into(),
            fault,
            source: None,
        }
    }

    pub fn service_failed(service: impl Into<String>, cause: DiscoveryError) -> Self {
        DiscoveryError::Service {
            service: service.into(),
            fault: ServiceFault::Failed,
            source: Some(Box::new(cause)),
        }
    }

    /// Wrap an error observed at the engine boundary, preserving the
    /// original cause chain. Errors already wrapped pass through.
    pub fn at_engine(self, message: impl Into<String>) -> Self {
        match self {
            e @ DiscoveryError::Engine { .. } => e,
            other => DiscoveryError::Engine {
                message: message.into(),
                source: Box::new(other),
            },
        }
    }

    /// Walk the cause chain looking for a `DiscoveryError` matching the
    /// predicate. Used by callers that need to classify wrapped failures.
    pub fn find_cause<F>(&self, predicate: F) -> Option<&DiscoveryError>
    where
        F: Fn(&DiscoveryError) -> bool,
    {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(de) = err.downcast_ref::<DiscoveryError>() {
                if predicate(de) {
                    return Some(de);
                }
            }
            current = err.source();
        }
        None
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
