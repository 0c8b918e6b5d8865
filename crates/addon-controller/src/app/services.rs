use std::sync::Arc;

use crate::capability::CapabilityCoordinator;
use crate::controller::Manager;

/// Long-lived components shared by the application tasks.
pub struct ApplicationServices {
    pub manager: Arc<Manager>,
    pub coordinator: Arc<CapabilityCoordinator>,
}
