use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use tokio::select;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::capability::ActivationStatus;
use crate::controller::ControllerError;
use crate::controller::ControllerHandle;
use crate::controller::ControllerKind;
use crate::controller::Reconciler;
use crate::controller::SourceWatcher;
use crate::controller::Trigger;
use crate::controller::WatchedResource;

const TRIGGER_QUEUE_CAPACITY: usize = 256;

/// Tuning shared by every controller the manager runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Wait before re-establishing a failed watch.
    pub reconnect_interval: Duration,
    /// Reconciles allowed in flight per controller.
    pub concurrent_reconciles: usize,
    /// Interval after which every watch is re-listed, replaying all objects.
    /// `None` disables resync.
    pub sync_period: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            concurrent_reconciles: 10,
            sync_period: Some(Duration::from_secs(600)),
        }
    }
}

/// How a source stream stopped without an error.
enum StreamEnd {
    /// The watch ended on its own and should be re-established.
    Ended,
    /// The sync period elapsed; re-list to replay every object.
    Resync,
    /// The controller's trigger queue is gone, nothing left to feed.
    QueueClosed,
}

/// Owns the constructed controllers and runs them once boot has settled.
pub struct Manager {
    controllers: Vec<ControllerHandle>,
    source_watcher: Arc<dyn SourceWatcher>,
    reconciler: Arc<dyn Reconciler>,
    config: ManagerConfig,
}

impl Manager {
    pub fn new(
        source_watcher: Arc<dyn SourceWatcher>,
        reconciler: Arc<dyn Reconciler>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            controllers: Vec::new(),
            source_watcher,
            reconciler,
            config,
        }
    }

    /// Construct a controller. Its watch set stays open until [`Manager::start`].
    pub fn add_controller(&mut self, kind: ControllerKind) -> ControllerHandle {
        let handle = ControllerHandle::new(kind);
        self.controllers.push(handle.clone());
        handle
    }

    pub fn controllers(&self) -> &[ControllerHandle] {
        &self.controllers
    }

    /// Seal every watch set and serve until cancelled.
    ///
    /// Sealing waits for `activation` to settle so that every capability found
    /// present at boot has attached its sources before the first watch starts.
    #[tracing::instrument(skip_all)]
    pub async fn start(&self, activation: &ActivationStatus, token: CancellationToken) {
        info!("Waiting for optional capabilities to settle");
        select! {
            biased;
            _ = token.cancelled() => {
                info!("Manager shutdown requested before start");
                return;
            }
            _ = activation.settled() => {}
        }
        for (descriptor, state) in activation.states() {
            info!(capability = descriptor.name, %state, "Optional capability settled");
        }

        let mut tasks = JoinSet::new();
        for controller in &self.controllers {
            let kind = controller.kind();
            let sources = controller.seal();
            info!(
                controller = %kind,
                sources = %sources.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
                concurrent_reconciles = self.config.concurrent_reconciles,
                "Starting controller"
            );

            let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
            for resource in sources {
                tasks.spawn(run_source(
                    self.source_watcher.clone(),
                    kind,
                    resource,
                    trigger_tx.clone(),
                    token.clone(),
                    self.config,
                ));
            }
            tasks.spawn(run_dispatch(
                kind,
                trigger_rx,
                self.reconciler.clone(),
                self.config.concurrent_reconciles,
                token.clone(),
            ));
        }
        info!("Manager started");

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Controller task failed: {e}");
            }
        }
        info!("Manager stopped");
    }
}

async fn run_source(
    source_watcher: Arc<dyn SourceWatcher>,
    controller: ControllerKind,
    resource: WatchedResource,
    trigger_tx: mpsc::Sender<Trigger>,
    token: CancellationToken,
    config: ManagerConfig,
) {
    loop {
        let result = select! {
            _ = token.cancelled() => break,
            result = forward_events(
                source_watcher.as_ref(),
                controller,
                resource,
                &trigger_tx,
                config.sync_period,
            ) => result,
        };

        match result {
            Ok(StreamEnd::Ended) => {
                warn!(%controller, %resource, "Watch stream ended unexpectedly, restarting...");
            }
            Ok(StreamEnd::Resync) => {
                debug!(%controller, %resource, "Sync period elapsed, re-listing");
            }
            Ok(StreamEnd::QueueClosed) => break,
            Err(e) => {
                error!(%controller, %resource, "Watch failed: {e:?}");
                select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(config.reconnect_interval) => {}
                }
            }
        }
    }
}

async fn forward_events(
    source_watcher: &dyn SourceWatcher,
    controller: ControllerKind,
    resource: WatchedResource,
    trigger_tx: &mpsc::Sender<Trigger>,
    sync_period: Option<Duration>,
) -> Result<StreamEnd, Report<ControllerError>> {
    let mut stream = source_watcher.watch(resource);
    let resync = async {
        match sync_period {
            Some(period) => tokio::time::sleep(period).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(resync);

    loop {
        let event = select! {
            _ = &mut resync => return Ok(StreamEnd::Resync),
            event = stream.next() => event,
        };
        let Some(event) = event else {
            return Ok(StreamEnd::Ended);
        };

        let trigger = Trigger {
            controller,
            source: resource,
            object: event?,
        };
        if trigger_tx.send(trigger).await.is_err() {
            return Ok(StreamEnd::QueueClosed);
        }
    }
}

/// Feed triggers to the reconciler with at most `concurrency` in flight.
///
/// In-flight reconciles are awaited on shutdown.
async fn run_dispatch(
    controller: ControllerKind,
    mut trigger_rx: mpsc::Receiver<Trigger>,
    reconciler: Arc<dyn Reconciler>,
    concurrency: usize,
    token: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    loop {
        let permit = select! {
            biased;
            _ = token.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        let trigger = select! {
            biased;
            _ = token.cancelled() => break,
            trigger = trigger_rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let reconciler = reconciler.clone();
        in_flight.spawn(async move {
            if let Err(e) = reconciler.reconcile(trigger).await {
                error!(%controller, "Reconcile failed: {e:?}");
            }
            drop(permit);
        });

        while let Some(result) = in_flight.try_join_next() {
            if let Err(e) = result {
                error!(%controller, "Reconcile task failed: {e}");
            }
        }
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            error!(%controller, "Reconcile task failed: {e}");
        }
    }
}
