use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use error_stack::Report;

use crate::controller::AttachError;
use crate::controller::ControllerKind;
use crate::controller::WatchedResource;

#[derive(Debug)]
struct WatchSet {
    sources: Vec<WatchedResource>,
    sealed: bool,
}

/// A constructed controller that has not necessarily started yet.
///
/// Extra event sources can be attached until the [`Manager`](crate::controller::Manager)
/// seals the watch set on start. After that the set is immutable for the rest
/// of the process lifetime; picking up a new resource kind takes a restart.
///
/// Cloning is cheap and every clone refers to the same watch set.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    kind: ControllerKind,
    watch_set: Arc<Mutex<WatchSet>>,
}

impl ControllerHandle {
    /// Create a handle watching only the controller's primary resource.
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            watch_set: Arc::new(Mutex::new(WatchSet {
                sources: vec![kind.primary_resource()],
                sealed: false,
            })),
        }
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Register an additional resource whose events reach this controller.
    ///
    /// # Errors
    ///
    /// - [`AttachError::ControllerStarted`] if the watch set is already sealed
    /// - [`AttachError::DuplicateSource`] if the resource is already watched
    pub fn attach_source(&self, resource: WatchedResource) -> Result<(), Report<AttachError>> {
        let mut watch_set = self.lock();
        if watch_set.sealed {
            return Err(Report::new(AttachError::ControllerStarted {
                controller: self.kind,
            }));
        }
        if watch_set.sources.contains(&resource) {
            return Err(Report::new(AttachError::DuplicateSource {
                controller: self.kind,
                resource,
            }));
        }
        watch_set.sources.push(resource);
        Ok(())
    }

    /// Resources currently in the watch set, primary resource first.
    pub fn sources(&self) -> Vec<WatchedResource> {
        self.lock().sources.clone()
    }

    #[cfg(test)]
    pub(crate) fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Freeze the watch set and return it. Later attaches fail.
    pub(crate) fn seal(&self) -> Vec<WatchedResource> {
        let mut watch_set = self.lock();
        watch_set.sealed = true;
        watch_set.sources.clone()
    }

    fn lock(&self) -> MutexGuard<'_, WatchSet> {
        self.watch_set.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
