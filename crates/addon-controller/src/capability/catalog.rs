//! Compiled table of optional integrations.

use crate::capability::CapabilityDescriptor;
use crate::controller::ControllerKind;
use crate::controller::WatchedResource;

/// An event source a capability contributes to one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySource {
    pub controller: ControllerKind,
    pub resource: WatchedResource,
}

/// An optional integration and the event sources it brings along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub descriptor: CapabilityDescriptor,
    pub sources: &'static [CapabilitySource],
}

impl Capability {
    /// Resources this capability adds to the given controller.
    pub fn sources_for(
        &self,
        controller: ControllerKind,
    ) -> impl Iterator<Item = WatchedResource> + '_ {
        self.sources
            .iter()
            .filter(move |source| source.controller == controller)
            .map(|source| source.resource)
    }

    pub fn targets(&self, controller: ControllerKind) -> bool {
        self.sources_for(controller).next().is_some()
    }
}

const CAPI_GROUP: &str = "cluster.x-k8s.io";
const FLUX_SOURCE_GROUP: &str = "source.toolkit.fluxcd.io";

const CAPI_CLUSTER: WatchedResource =
    WatchedResource::new(CAPI_GROUP, "v1beta1", "Cluster", "clusters");
const CAPI_MACHINE: WatchedResource =
    WatchedResource::new(CAPI_GROUP, "v1beta1", "Machine", "machines");

const FLUX_GIT_REPOSITORY: WatchedResource =
    WatchedResource::new(FLUX_SOURCE_GROUP, "v1", "GitRepository", "gitrepositories");
const FLUX_OCI_REPOSITORY: WatchedResource =
    WatchedResource::new(FLUX_SOURCE_GROUP, "v1beta2", "OCIRepository", "ocirepositories");
const FLUX_BUCKET: WatchedResource =
    WatchedResource::new(FLUX_SOURCE_GROUP, "v1beta2", "Bucket", "buckets");

/// Cluster API: lifecycle of the managed clusters.
pub const CLUSTER_API: Capability = Capability {
    descriptor: CapabilityDescriptor {
        name: "cluster-api",
        signaling_crd: "clusters.cluster.x-k8s.io",
        api_group: CAPI_GROUP,
    },
    sources: &[
        CapabilitySource {
            controller: ControllerKind::ClusterProfile,
            resource: CAPI_CLUSTER,
        },
        CapabilitySource {
            controller: ControllerKind::ClusterProfile,
            resource: CAPI_MACHINE,
        },
        CapabilitySource {
            controller: ControllerKind::Profile,
            resource: CAPI_CLUSTER,
        },
        CapabilitySource {
            controller: ControllerKind::Profile,
            resource: CAPI_MACHINE,
        },
        CapabilitySource {
            controller: ControllerKind::ClusterSummary,
            resource: CAPI_CLUSTER,
        },
    ],
};

/// Flux source-controller: git, OCI and bucket artifact sources.
pub const FLUX_SOURCE: Capability = Capability {
    descriptor: CapabilityDescriptor {
        name: "flux",
        signaling_crd: "gitrepositories.source.toolkit.fluxcd.io",
        api_group: FLUX_SOURCE_GROUP,
    },
    sources: &[
        CapabilitySource {
            controller: ControllerKind::ClusterSummary,
            resource: FLUX_GIT_REPOSITORY,
        },
        CapabilitySource {
            controller: ControllerKind::ClusterSummary,
            resource: FLUX_OCI_REPOSITORY,
        },
        CapabilitySource {
            controller: ControllerKind::ClusterSummary,
            resource: FLUX_BUCKET,
        },
    ],
};

/// Every optional capability this process knows how to activate.
pub const CAPABILITIES: [Capability; 2] = [CLUSTER_API, FLUX_SOURCE];
