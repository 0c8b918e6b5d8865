use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use crate::capability::attach;
use crate::capability::resolve_presence;
use crate::capability::ActivationState;
use crate::capability::Capability;
use crate::capability::CapabilityDescriptor;
use crate::capability::InstallWatcher;
use crate::capability::Presence;
use crate::capability::PresenceProbe;
use crate::capability::RestartTrigger;
use crate::capability::RetryPolicy;
use crate::capability::WatchOutcome;
use crate::controller::ControllerHandle;

/// Runs one activation pipeline per optional capability.
pub struct CapabilityCoordinator {
    probe: Arc<dyn PresenceProbe>,
    install_watcher: Arc<InstallWatcher>,
    restart: Arc<dyn RestartTrigger>,
    policy: RetryPolicy,
}

impl CapabilityCoordinator {
    pub fn new(
        probe: Arc<dyn PresenceProbe>,
        install_watcher: Arc<InstallWatcher>,
        restart: Arc<dyn RestartTrigger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            probe,
            install_watcher,
            restart,
            policy,
        }
    }

    /// Spawn an independent pipeline for each capability.
    ///
    /// Each pipeline resolves presence, then either attaches the capability's
    /// sources to the matching `controllers` or waits for the capability to be
    /// installed and restarts the process when it is.
    pub fn start(
        &self,
        capabilities: &[Capability],
        controllers: &[ControllerHandle],
        token: &CancellationToken,
    ) -> Activation {
        let mut pipelines = Vec::with_capacity(capabilities.len());
        let mut tasks = Vec::with_capacity(capabilities.len());

        for capability in capabilities {
            let (state_tx, state_rx) = watch::channel(ActivationState::Probing);
            let pipeline = Pipeline {
                capability: *capability,
                controllers: controllers
                    .iter()
                    .filter(|controller| capability.targets(controller.kind()))
                    .cloned()
                    .collect(),
                probe: self.probe.clone(),
                install_watcher: self.install_watcher.clone(),
                restart: self.restart.clone(),
                policy: self.policy,
                state: state_tx,
                token: token.clone(),
            };

            tasks.push(tokio::spawn(pipeline.run()));
            pipelines.push((capability.descriptor, state_rx));
        }

        Activation {
            status: ActivationStatus { pipelines },
            tasks,
        }
    }
}

/// Running activation pipelines.
pub struct Activation {
    status: ActivationStatus,
    tasks: Vec<JoinHandle<()>>,
}

impl Activation {
    pub fn status(&self) -> ActivationStatus {
        self.status.clone()
    }

    /// Wait for every pipeline task to exit.
    ///
    /// Pipelines of absent capabilities only exit on install or shutdown.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Capability pipeline failed: {e}");
            }
        }
    }
}

/// Read-only view of every pipeline's [`ActivationState`].
#[derive(Debug, Clone, Default)]
pub struct ActivationStatus {
    pipelines: Vec<(CapabilityDescriptor, watch::Receiver<ActivationState>)>,
}

impl ActivationStatus {
    pub fn states(&self) -> Vec<(CapabilityDescriptor, ActivationState)> {
        self.pipelines
            .iter()
            .map(|(descriptor, state)| (*descriptor, *state.borrow()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn state(&self, name: &str) -> Option<ActivationState> {
        self.pipelines
            .iter()
            .find(|(descriptor, _)| descriptor.name == name)
            .map(|(_, state)| *state.borrow())
    }

    /// Resolves once no pipeline is still probing.
    ///
    /// A pipeline that stopped while probing (shutdown) also counts as settled.
    pub async fn settled(&self) {
        for (_, state) in &self.pipelines {
            let mut state = state.clone();
            loop {
                if *state.borrow_and_update() != ActivationState::Probing {
                    break;
                }
                if state.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

struct Pipeline {
    capability: Capability,
    controllers: Vec<ControllerHandle>,
    probe: Arc<dyn PresenceProbe>,
    install_watcher: Arc<InstallWatcher>,
    restart: Arc<dyn RestartTrigger>,
    policy: RetryPolicy,
    state: watch::Sender<ActivationState>,
    token: CancellationToken,
}

impl Pipeline {
    #[tracing::instrument(skip_all, fields(capability = self.capability.descriptor.name))]
    async fn run(self) {
        info!(state = %ActivationState::Probing, "Probing optional capability");

        let presence = resolve_presence(
            self.probe.as_ref(),
            &self.capability.descriptor,
            self.policy,
            &self.token,
        )
        .await;

        match presence {
            Some(Presence::Present) => self.attach_sources(),
            Some(Presence::Absent) => self.wait_for_install().await,
            None => info!("Capability probing cancelled"),
        }
    }

    fn attach_sources(&self) {
        let descriptor = &self.capability.descriptor;
        info!("{} present", descriptor.name);

        for controller in &self.controllers {
            match attach(&self.capability, controller) {
                Ok(()) => info!(controller = %controller.kind(), "Started {} watcher", descriptor.name),
                Err(e) => error!(
                    controller = %controller.kind(),
                    "Failed to start {} watcher: {e:?}", descriptor.name
                ),
            }
        }

        self.state.send_replace(ActivationState::Attached);
        info!(state = %ActivationState::Attached, "Capability activated");
    }

    async fn wait_for_install(&self) {
        let descriptor = &self.capability.descriptor;
        self.state.send_replace(ActivationState::Watching);
        info!(
            state = %ActivationState::Watching,
            "{} currently not present. Starting CRD watcher", descriptor.name
        );

        let restart = self.restart.clone();
        let token = self.token.clone();
        let outcome = self
            .install_watcher
            .watch_for_install(
                descriptor.api_group,
                move || {
                    if token.is_cancelled() {
                        info!("Shutdown in progress, not restarting");
                    } else {
                        restart.trigger_restart();
                    }
                },
                &self.token,
            )
            .await;

        if outcome == WatchOutcome::Installed {
            info!("{} installed, restart requested", descriptor.name);
        }
    }
}
