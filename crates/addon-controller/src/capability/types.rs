use core::error::Error;

use error_stack::Report;

/// Static definition of one optional capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityDescriptor {
    /// Short name used in logs.
    pub name: &'static str,
    /// CRD whose existence signals that the capability is installed.
    pub signaling_crd: &'static str,
    /// API group whose CRDs appearing later forces a restart.
    pub api_group: &'static str,
}

/// Outcome of a single presence probe.
#[derive(Debug)]
pub enum PresenceResult {
    Present,
    Absent,
    /// The API server could not give an answer; worth asking again.
    TransientError(Report<CapabilityError>),
}

/// A resolved presence answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Presence {
    #[display("present")]
    Present,
    #[display("absent")]
    Absent,
}

/// Where a capability's activation pipeline stands.
///
/// Transitions only move forward: `Probing` to either `Attached` or `Watching`.
/// A `Watching` capability leaves the state only by restarting the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ActivationState {
    #[display("probing")]
    Probing,
    /// Confirmed absent, waiting for its CRDs to be installed.
    #[display("absent-watching")]
    Watching,
    /// Confirmed present, event sources attached to the controllers.
    #[display("present-attached")]
    Attached,
}

/// Errors raised while activating optional capabilities.
#[derive(Debug, derive_more::Display)]
pub enum CapabilityError {
    #[display("Failed to look up CRD {crd}")]
    ProbeFailed { crd: String },
    #[display("Failed to watch CRDs: {message}")]
    WatchFailed { message: String },
}

impl Error for CapabilityError {}
