use crate::service::DiscoveryService;
use async_trait::async_trait;
use metascan_core::{Analyzer, DiscoveryContext, DiscoveryError, Result, ServiceFault};
use tracing::{debug, warn};

/// Choreography of a pipeline's embedded services. The provided
/// implementation is the baseline contract: strict sequential, in-order
/// execution, each child run to completion (or failure) and disconnected
/// before the next one starts. Pipelines wanting different scheduling
/// (fan-out, timeouts, WaitingToComplete reporting) override
/// `run_discovery_pipeline` and own their ordering and merge semantics.
#[async_trait]
pub trait PipelineChoreography: Send + Sync {
    fn pipeline_name(&self) -> &str;

    fn embedded_services(&self) -> &[DiscoveryService];

    async fn run_discovery_pipeline(&self, ctx: &DiscoveryContext) -> Result<()> {
        for child in self.embedded_services() {
            debug!(pipeline = %self.pipeline_name(), child = %child.name(), "running embedded service");
            child.set_context(ctx.clone())?;
            let outcome = child.start().await;
            // The child's lifecycle closes here either way; the pipeline's
            // own disconnect does not revisit it.
            let released = child.disconnect().await;
            match outcome {
                Ok(()) => released?,
                Err(e) => {
                    if let Err(release_err) = released {
                        warn!(
                            pipeline = %self.pipeline_name(),
                            child = %child.name(),
                            error = %release_err,
                            "failed child did not release cleanly"
                        );
                    }
                    warn!(
                        pipeline = %self.pipeline_name(),
                        child = %child.name(),
                        "embedded service failed, aborting pipeline"
                    );
                    return Err(DiscoveryError::service_failed(self.pipeline_name(), e));
                }
            }
        }
        Ok(())
    }
}

/// A discovery service composed of an ordered sequence of embedded
/// services sharing one result graph: each child receives a clone of the
/// pipeline's context, so partial results pool and later children can
/// read what earlier ones wrote.
pub struct DiscoveryPipeline {
    name: String,
    children: Vec<DiscoveryService>,
}

impl DiscoveryPipeline {
    pub fn new(name: impl Into<String>, children: Vec<DiscoveryService>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn from_analyzers(
        name: impl Into<String>,
        analyzers: Vec<Box<dyn Analyzer>>,
    ) -> Self {
        Self::new(
            name,
            analyzers.into_iter().map(DiscoveryService::new).collect(),
        )
    }
}

impl PipelineChoreography for DiscoveryPipeline {
    fn pipeline_name(&self) -> &str {
        &self.name
    }

    fn embedded_services(&self) -> &[DiscoveryService] {
        &self.children
    }
}

#[async_trait]
impl Analyzer for DiscoveryPipeline {
    async fn analyze(&self, ctx: &DiscoveryContext) -> Result<()> {
        if self.children.is_empty() {
            return Err(DiscoveryError::service(
                self.name.clone(),
                ServiceFault::NoEmbeddedServices,
            ));
        }
        self.run_discovery_pipeline(ctx).await
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
