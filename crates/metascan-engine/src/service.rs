use metascan_core::{Analyzer, DiscoveryContext, DiscoveryError, Result, ServiceFault};
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Lifecycle of one discovery service invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Configured,
    Running,
    Terminated,
}

/// Harness around an [`Analyzer`] enforcing the service lifecycle:
/// context attached before start, start runs the analysis, disconnect
/// releases resources. The context slot is lock-guarded so status
/// pollers can read it while the analysis is still writing results.
pub struct DiscoveryService {
    analyzer: Box<dyn Analyzer>,
    name: String,
    context: RwLock<Option<DiscoveryContext>>,
    state: RwLock<ServiceState>,
}

impl DiscoveryService {
    pub fn new(analyzer: Box<dyn Analyzer>) -> Self {
        let name = analyzer.display_name().to_string();
        Self {
            analyzer,
            name,
            context: RwLock::new(None),
            state: RwLock::new(ServiceState::Created),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// Attaches the discovery context. Valid only before `start()`;
    /// repeated calls are last-writer-wins.
    pub fn set_context(&self, ctx: DiscoveryContext) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            ServiceState::Created | ServiceState::Configured => {
                *self.context.write() = Some(ctx);
                *state = ServiceState::Configured;
                Ok(())
            }
            ServiceState::Running | ServiceState::Terminated => {
                Err(DiscoveryError::invalid_parameter(
                    "context",
                    format!("service {} has already started", self.name),
                ))
            }
        }
    }

    /// Readable at any time; before `disconnect()` it may reflect a run
    /// still in progress.
    pub fn context(&self) -> Option<DiscoveryContext> {
        self.context.read().clone()
    }

    /// Runs the analysis. Fails with a null-context fault when no
    /// context was attached; an analyzer failure is surfaced with this
    /// service named and the original cause preserved.
    pub async fn start(&self) -> Result<()> {
        let ctx = self
            .context
            .read()
            .clone()
            .ok_or_else(|| DiscoveryError::service(self.name.clone(), ServiceFault::NullContext))?;
        {
            let mut state = self.state.write();
            match *state {
                ServiceState::Configured => *state = ServiceState::Running,
                other => {
                    return Err(DiscoveryError::invalid_parameter(
                        "state",
                        format!("service {} cannot start from {:?}", self.name, other),
                    ))
                }
            }
        }
        debug!(service = %self.name, report = %ctx.report_id(), "discovery service starting");
        match self.analyzer.analyze(&ctx).await {
            Ok(()) => {
                debug!(service = %self.name, "discovery service finished");
                Ok(())
            }
            Err(e) => {
                warn!(service = %self.name, error = %e, "discovery service failed");
                Err(DiscoveryError::service_failed(self.name.clone(), e))
            }
        }
    }

    /// Releases analyzer resources. Safe to call more than once; later
    /// calls are no-ops.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state == ServiceState::Terminated {
                return Ok(());
            }
            *state = ServiceState::Terminated;
        }
        debug!(service = %self.name, "discovery service disconnected");
        self.analyzer.release().await
    }
}
