use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use futures::stream::BoxStream;
use futures::Stream;
use futures::StreamExt;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::core::Application;
use crate::capability::CAPABILITIES;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    tasks: Vec<JoinHandle<()>>,
    manager_task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Receiver<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            manager_task: None,
            shutdown_signal: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    ///
    /// Signal handlers go in before anything else runs, so the SIGTERM sent
    /// by [`crate::capability::SignalRestart`] ends in a graceful shutdown.
    pub fn spawn_all_tasks(&mut self, app: &Application) -> Result<()> {
        self.shutdown_signal = Some(spawn_signal_handler()?);

        let services = app.services();
        let activation = services.coordinator.start(
            &CAPABILITIES,
            services.manager.controllers(),
            &self.cancellation_token,
        );
        let status = activation.status();

        self.tasks.push(tokio::spawn(async move {
            tracing::info!("Starting capability activation task");
            activation.join().await;
            tracing::info!("Capability activation task completed");
        }));

        let manager = services.manager.clone();
        let token = self.cancellation_token.clone();
        self.manager_task = Some(tokio::spawn(async move {
            tracing::info!("Starting controller manager task");
            manager.start(&status, token).await;
            tracing::info!("Controller manager task completed");
        }));

        Ok(())
    }

    /// wait for a shutdown signal or for the manager to stop on its own
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        let (Some(shutdown_signal), Some(mut manager_task)) =
            (self.shutdown_signal.take(), self.manager_task.take())
        else {
            anyhow::bail!("Tasks have not been spawned");
        };

        let signalled = tokio::select! {
            _ = shutdown_signal => true,
            result = &mut manager_task => {
                if let Err(e) = result {
                    tracing::error!("Controller manager task failed: {e}");
                    self.cancellation_token.cancel();
                    self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;
                    return Err(e.into());
                }
                tracing::warn!("Controller manager stopped unexpectedly");
                false
            }
        };

        if signalled {
            tracing::info!("Shutdown signal received, cancelling all tasks");
            self.tasks.push(manager_task);
        }
        self.cancellation_token.cancel();
        self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }
}

/// Install the SIGTERM and SIGINT handlers.
///
/// The returned receiver completes on the first signal. A second signal
/// during shutdown exits the process immediately.
fn spawn_signal_handler() -> Result<oneshot::Receiver<()>> {
    let signals = unix_signals()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(relay_signals(signals, shutdown_tx, |_| {
        std::process::exit(1);
    }));
    Ok(shutdown_rx)
}

fn unix_signals() -> Result<BoxStream<'static, &'static str>> {
    let sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    Ok(
        futures::stream::unfold((sigterm, sigint), |(mut sigterm, mut sigint)| async move {
            let name = tokio::select! {
                Some(()) = sigterm.recv() => "SIGTERM",
                Some(()) = sigint.recv() => "SIGINT",
                else => return None,
            };
            Some((name, (sigterm, sigint)))
        })
        .boxed(),
    )
}

async fn relay_signals<S, F>(mut signals: S, shutdown: oneshot::Sender<()>, force_exit: F)
where
    S: Stream<Item = &'static str> + Unpin,
    F: FnOnce(&'static str),
{
    let Some(name) = signals.next().await else {
        return;
    };
    tracing::info!("Received {name}, initiating graceful shutdown");
    let _ = shutdown.send(());

    if let Some(name) = signals.next().await {
        tracing::warn!("Received {name} during shutdown, exiting immediately");
        force_exit(name);
    }
}
