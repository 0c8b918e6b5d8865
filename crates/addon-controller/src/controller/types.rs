use core::error::Error;

use crate::controller::ControllerKind;
use crate::controller::WatchedResource;

/// Errors returned when registering an extra event source with a controller.
#[derive(Debug, PartialEq, Eq, derive_more::Display)]
pub enum AttachError {
    #[display("Controller {controller} has already started, its watch set is sealed")]
    ControllerStarted { controller: ControllerKind },
    #[display("Controller {controller} already watches {resource}")]
    DuplicateSource {
        controller: ControllerKind,
        resource: WatchedResource,
    },
}

impl Error for AttachError {}

/// Errors that can occur while a controller is serving.
#[derive(Debug, derive_more::Display)]
pub enum ControllerError {
    #[display("Failed to watch {resource}: {message}")]
    WatchFailed {
        resource: WatchedResource,
        message: String,
    },
    #[display("Failed to reconcile {controller} {name}: {message}")]
    ReconcileFailed {
        controller: ControllerKind,
        name: String,
        message: String,
    },
}

impl Error for ControllerError {}
