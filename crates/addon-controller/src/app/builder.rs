use std::sync::Arc;

use anyhow::Result;
use kube::Client;

use crate::app::Application;
use crate::app::ApplicationServices;
use crate::capability::CapabilityCoordinator;
use crate::capability::InstallWatcher;
use crate::capability::KubeCrdEvents;
use crate::capability::KubeCrdProbe;
use crate::capability::RetryPolicy;
use crate::capability::SignalRestart;
use crate::config::Cli;
use crate::controller::ControllerKind;
use crate::controller::KubeSourceWatcher;
use crate::controller::Manager;
use crate::controller::ManagerConfig;
use crate::controller::TracingReconciler;
use crate::infrastructure::init_kube_client;

/// Application builder
pub struct ApplicationBuilder {
    cli: Cli,
}

impl ApplicationBuilder {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build complete application
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let client = init_kube_client(self.cli.manager.kubeconfig.as_deref())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;

        let manager = self.create_manager(client.clone());
        let coordinator = self.create_coordinator(client);

        Ok(Application::new(ApplicationServices {
            manager: Arc::new(manager),
            coordinator: Arc::new(coordinator),
        }))
    }

    fn create_manager(&self, client: Client) -> Manager {
        let mut manager = Manager::new(
            Arc::new(KubeSourceWatcher::new(client)),
            Arc::new(TracingReconciler),
            ManagerConfig {
                reconnect_interval: self.cli.capability.crd_watch_reconnect_interval(),
                concurrent_reconciles: usize::from(self.cli.manager.concurrent_reconciles),
                sync_period: self.cli.manager.sync_period(),
            },
        );

        if self.cli.manager.is_sharded() {
            tracing::info!(
                shard_key = %self.cli.manager.shard_key,
                "Shard key set, only the ClusterSummary controller runs"
            );
        } else {
            manager.add_controller(ControllerKind::ClusterProfile);
            manager.add_controller(ControllerKind::Profile);
        }
        manager.add_controller(ControllerKind::ClusterSummary);

        manager
    }

    fn create_coordinator(&self, client: Client) -> CapabilityCoordinator {
        let install_watcher = InstallWatcher::new(
            Arc::new(KubeCrdEvents::new(client.clone())),
            self.cli.capability.crd_watch_reconnect_interval(),
        );

        CapabilityCoordinator::new(
            Arc::new(KubeCrdProbe::new(client)),
            Arc::new(install_watcher),
            Arc::new(SignalRestart::sigterm()),
            RetryPolicy::from(&self.cli.capability),
        )
    }
}
