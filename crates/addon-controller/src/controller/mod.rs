//! Workload-delivery controllers as seen from process bootstrap.
//!
//! Reconciliation itself lives behind the [`Reconciler`] trait. This module
//! owns what bootstrap needs: which resources each controller watches, the
//! window in which extra event sources may still be attached, and the
//! [`Manager`] that seals the watch sets and starts serving.
//!
//! The main components are:
//! - [`ControllerHandle`]: a constructed controller whose watch set is open until start
//! - [`Manager`]: seals every handle and turns watch events into [`Trigger`]s
//! - [`SourceWatcher`]: the seam that produces object events for a watched resource

pub mod handle;
pub mod manager;
pub mod reconciler;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

use kube::core::ApiResource;
use kube::core::GroupVersionKind;

pub use handle::ControllerHandle;
pub use manager::Manager;
pub use manager::ManagerConfig;
pub use reconciler::Reconciler;
pub use reconciler::TracingReconciler;
pub use source::KubeSourceWatcher;
pub use source::SourceWatcher;
pub use types::AttachError;
pub use types::ControllerError;

/// API group of the addon controller's own resources.
pub const CONFIG_GROUP: &str = "config.projectsveltos.io";

/// Controllers constructed by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ControllerKind {
    ClusterProfile,
    Profile,
    ClusterSummary,
}

impl ControllerKind {
    /// Resource reconciled by this controller, watched from the start.
    pub fn primary_resource(self) -> WatchedResource {
        match self {
            ControllerKind::ClusterProfile => {
                WatchedResource::new(CONFIG_GROUP, "v1beta1", "ClusterProfile", "clusterprofiles")
            }
            ControllerKind::Profile => {
                WatchedResource::new(CONFIG_GROUP, "v1beta1", "Profile", "profiles")
            }
            ControllerKind::ClusterSummary => WatchedResource::new(
                CONFIG_GROUP,
                "v1beta1",
                "ClusterSummary",
                "clustersummaries",
            ),
        }
    }
}

/// A resource kind a controller receives events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{kind}.{version}.{group}")]
pub struct WatchedResource {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl WatchedResource {
    pub const fn new(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(self.group, self.version, self.kind),
            self.plural,
        )
    }
}

/// Name and namespace of an observed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

/// An observed object routed to the controller that watches its resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub controller: ControllerKind,
    pub source: WatchedResource,
    pub object: ObjectKey,
}
