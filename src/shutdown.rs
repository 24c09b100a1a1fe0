use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::workflow::WorkflowController;

/// Graceful shutdown for a running workflow.
///
/// On Ctrl-C the controller is disposed: the live poll stops, late backend replies
/// are dropped and every update channel closes, so whatever is waiting on the
/// workflow unwinds on its own.
pub struct ShutdownCoordinator {
    controller: WorkflowController,
}

impl ShutdownCoordinator {
    pub fn new(controller: WorkflowController) -> Self {
        Self { controller }
    }

    /// Wait for Ctrl-C, then shut down
    pub async fn wait_for_shutdown(self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received, shutting down workflow");
        self.shutdown();
        Ok(())
    }

    /// Run [`Self::wait_for_shutdown`] in the background
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.wait_for_shutdown().await {
                warn!("Failed to listen for interrupt: {}", e);
            }
        })
    }

    pub fn shutdown(&self) {
        self.controller.dispose();
        info!("Graceful shutdown completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockRepoFlowBackend;
    use crate::workflow::PollerConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_shutdown_disposes_controller_and_closes_updates() {
        let controller =
            WorkflowController::new(Arc::new(MockRepoFlowBackend::new()), PollerConfig::default());
        let (mut updates, _subscription) = controller.updates();

        ShutdownCoordinator::new(controller.clone()).shutdown();

        assert!(controller.is_disposed());
        assert!(updates.recv().await.is_none());
    }
}
