//! Orchestration layer of the Metascan discovery engine: per-request
//! asset resolution, the discovery-service lifecycle harness, sequential
//! pipelines, and the engine boundary that tracks requests.

pub mod audit;
pub mod engine;
pub mod pipeline;
pub mod resolver;
pub mod service;

pub use audit::TracingAuditLog;
pub use engine::DiscoveryEngine;
pub use pipeline::{DiscoveryPipeline, PipelineChoreography};
pub use resolver::AssetResolver;
pub use service::{DiscoveryService, ServiceState};
