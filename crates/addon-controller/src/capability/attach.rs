use error_stack::Report;

use crate::capability::Capability;
use crate::controller::AttachError;
use crate::controller::ControllerHandle;

/// Register every event source `capability` contributes to `controller`.
///
/// Must run before the manager seals the controller's watch set. Sources
/// registered before a failure stay registered.
///
/// # Errors
///
/// - [`AttachError::ControllerStarted`] if the controller is already serving
/// - [`AttachError::DuplicateSource`] if a source is already watched
pub fn attach(
    capability: &Capability,
    controller: &ControllerHandle,
) -> Result<(), Report<AttachError>> {
    for resource in capability.sources_for(controller.kind()) {
        controller
            .attach_source(resource)
            .map_err(|e| e.attach_printable(format!("capability: {}", capability.descriptor.name)))?;
    }
    Ok(())
}
