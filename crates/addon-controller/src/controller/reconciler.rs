use error_stack::Report;
use tracing::debug;

use crate::controller::ControllerError;
use crate::controller::Trigger;

/// Reconciliation entry point for a controller.
///
/// Implementations receive every object event routed to their controller,
/// including events from sources attached at boot.
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, trigger: Trigger) -> Result<(), Report<ControllerError>>;
}

/// Reconciler that records each trigger in the log and does nothing else.
///
/// Used when the process runs without a reconciliation backend wired in.
#[derive(Debug, Default)]
pub struct TracingReconciler;

#[async_trait::async_trait]
impl Reconciler for TracingReconciler {
    async fn reconcile(&self, trigger: Trigger) -> Result<(), Report<ControllerError>> {
        debug!(
            controller = %trigger.controller,
            source = %trigger.source,
            namespace = trigger.object.namespace.as_deref().unwrap_or(""),
            name = %trigger.object.name,
            "reconcile requested"
        );
        Ok(())
    }
}
