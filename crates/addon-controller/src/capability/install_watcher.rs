use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use futures::stream::BoxStream;
use futures::StreamExt;
use futures::TryStreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::runtime::watcher::watcher;
use kube::runtime::watcher::Config;
use kube::runtime::WatchStreamExt;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::capability::CapabilityError;

/// Stream of CRD objects, starting with the ones that already exist.
pub type CrdStream = BoxStream<'static, Result<CustomResourceDefinition, Report<CapabilityError>>>;

/// Produces CRD events for the install watcher.
pub trait CrdEventSource: Send + Sync {
    fn crd_events(&self) -> CrdStream;
}

/// Watches every CRD in the cluster.
///
/// CRDs are cluster scoped and carry no reliable group label, so the stream
/// is unfiltered and callers compare `spec.group` themselves.
pub struct KubeCrdEvents {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdEvents {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

impl CrdEventSource for KubeCrdEvents {
    fn crd_events(&self) -> CrdStream {
        watcher(self.api.clone(), Config::default())
            .applied_objects()
            .map_err(|e| {
                Report::new(CapabilityError::WatchFailed {
                    message: format!("Watch stream error: {e}"),
                })
            })
            .boxed()
    }
}

/// How a call to [`InstallWatcher::watch_for_install`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A CRD of the watched group showed up and the handler ran.
    Installed,
    /// Shutdown was requested first; the handler never ran.
    Cancelled,
}

/// Waits for a CRD of a given API group to appear.
pub struct InstallWatcher {
    source: Arc<dyn CrdEventSource>,
    reconnect_interval: Duration,
}

impl InstallWatcher {
    pub fn new(source: Arc<dyn CrdEventSource>, reconnect_interval: Duration) -> Self {
        Self {
            source,
            reconnect_interval,
        }
    }

    /// Watch CRDs until one in `api_group` is observed, then call `on_installed`.
    ///
    /// A CRD that already exists when the watch (re)starts counts as observed.
    /// The handler runs at most once and the watch stops right after it.
    /// Stream failures are retried after the reconnect interval.
    #[tracing::instrument(skip(self, on_installed, token))]
    pub async fn watch_for_install<F>(
        &self,
        api_group: &str,
        on_installed: F,
        token: &CancellationToken,
    ) -> WatchOutcome
    where
        F: FnOnce(),
    {
        info!("Starting CRD install watcher");

        loop {
            let result = select! {
                biased;
                _ = token.cancelled() => {
                    info!("CRD install watcher shutdown requested");
                    return WatchOutcome::Cancelled;
                }
                result = self.wait_for_group(api_group) => result,
            };

            match result {
                Ok(Some(crd_name)) => {
                    info!(crd = %crd_name, "CRD installed for watched API group");
                    on_installed();
                    return WatchOutcome::Installed;
                }
                Ok(None) => {
                    warn!("CRD watch stream ended unexpectedly, restarting...");
                }
                Err(e) => {
                    error!("CRD watch failed: {e:?}");
                    select! {
                        biased;
                        _ = token.cancelled() => {
                            info!("CRD install watcher shutdown requested");
                            return WatchOutcome::Cancelled;
                        }
                        _ = tokio::time::sleep(self.reconnect_interval) => {}
                    }
                }
            }
        }
    }

    /// Name of the first CRD seen in `api_group`, or `None` if the stream ended.
    async fn wait_for_group(
        &self,
        api_group: &str,
    ) -> Result<Option<String>, Report<CapabilityError>> {
        let mut stream = self.source.crd_events();

        while let Some(crd) = stream.try_next().await? {
            if crd.spec.group == api_group {
                return Ok(Some(crd.name_any()));
            }
        }

        Ok(None)
    }
}
