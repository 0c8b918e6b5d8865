use error_stack::Report;
use futures::stream::BoxStream;
use futures::StreamExt;
use futures::TryStreamExt;
use kube::api::DynamicObject;
use kube::runtime::watcher::watcher;
use kube::runtime::watcher::Config;
use kube::runtime::WatchStreamExt;
use kube::Api;
use kube::Client;
use kube::ResourceExt;

use crate::controller::ControllerError;
use crate::controller::ObjectKey;
use crate::controller::WatchedResource;

/// Stream of objects observed for one watched resource.
///
/// The stream ending or yielding an error means the watch must be re-established.
pub type ObjectStream = BoxStream<'static, Result<ObjectKey, Report<ControllerError>>>;

/// Produces object events for a watched resource.
pub trait SourceWatcher: Send + Sync {
    fn watch(&self, resource: WatchedResource) -> ObjectStream;
}

/// Watches arbitrary resources through the dynamic API.
pub struct KubeSourceWatcher {
    client: Client,
}

impl KubeSourceWatcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SourceWatcher for KubeSourceWatcher {
    fn watch(&self, resource: WatchedResource) -> ObjectStream {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource.api_resource());

        watcher(api, Config::default())
            .applied_objects()
            .map_ok(|object| ObjectKey {
                namespace: object.namespace(),
                name: object.name_any(),
            })
            .map_err(move |e| {
                Report::new(ControllerError::WatchFailed {
                    resource,
                    message: format!("Watch stream error: {e}"),
                })
            })
            .boxed()
    }
}
