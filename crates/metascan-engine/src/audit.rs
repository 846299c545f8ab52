use metascan_core::{AuditLog, RequestId};
use tracing::info;

/// Default audit sink: structured log records through `tracing`.
#[derive(Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, request: RequestId, message: &str) {
        info!(request = %request, "{}", message);
    }
}
