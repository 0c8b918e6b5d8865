//! Optional integrations that are activated at boot when present.
//!
//! Each capability is resolved by its own pipeline: probe for the signaling
//! CRD, then either attach the capability's event sources to the controllers
//! or watch for its API group and restart the process once it shows up.

mod attach;
pub mod catalog;
mod coordinator;
mod install_watcher;
mod probe;
mod restart;
mod retry;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use attach::attach;
pub use catalog::Capability;
pub use catalog::CAPABILITIES;
pub use coordinator::Activation;
pub use coordinator::ActivationStatus;
pub use coordinator::CapabilityCoordinator;
pub use install_watcher::CrdEventSource;
pub use install_watcher::CrdStream;
pub use install_watcher::InstallWatcher;
pub use install_watcher::KubeCrdEvents;
pub use install_watcher::WatchOutcome;
pub use probe::KubeCrdProbe;
pub use probe::PresenceProbe;
pub use restart::RestartTrigger;
pub use restart::SignalRestart;
pub use retry::resolve_presence;
pub use retry::RetryPolicy;
pub use types::ActivationState;
pub use types::CapabilityDescriptor;
pub use types::CapabilityError;
pub use types::Presence;
pub use types::PresenceResult;
