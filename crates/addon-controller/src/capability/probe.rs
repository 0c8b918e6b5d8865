use error_stack::Report;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::Api;
use kube::Client;

use crate::capability::CapabilityDescriptor;
use crate::capability::CapabilityError;
use crate::capability::PresenceResult;

/// Asks the API server, once, whether a capability is installed.
///
/// Implementations must not retry or sleep; see
/// [`resolve_presence`](crate::capability::resolve_presence) for that.
#[async_trait::async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn probe(&self, descriptor: &CapabilityDescriptor) -> PresenceResult;
}

/// Probes by reading the capability's signaling CRD.
pub struct KubeCrdProbe {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdProbe {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait::async_trait]
impl PresenceProbe for KubeCrdProbe {
    async fn probe(&self, descriptor: &CapabilityDescriptor) -> PresenceResult {
        let result = self.api.get(descriptor.signaling_crd).await.map(|_| ());
        classify(descriptor, result)
    }
}

/// Map a CRD lookup to a presence answer. Only 404 means absent.
pub(crate) fn classify(
    descriptor: &CapabilityDescriptor,
    result: Result<(), kube::Error>,
) -> PresenceResult {
    match result {
        Ok(()) => PresenceResult::Present,
        Err(kube::Error::Api(response)) if response.code == 404 => PresenceResult::Absent,
        Err(e) => {
            PresenceResult::TransientError(Report::new(e).change_context(
                CapabilityError::ProbeFailed {
                    crd: descriptor.signaling_crd.to_string(),
                },
            ))
        }
    }
}
