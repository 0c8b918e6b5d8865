use std::time::Duration;

use clap::Parser;

use crate::capability::RetryPolicy;

#[derive(Parser, Debug, Clone)]
pub struct CapabilityArgs {
    #[arg(
        long,
        default_value = "20",
        help = "Probe attempts for an optional capability before it is treated as absent"
    )]
    pub capability_probe_attempts: u32,

    #[arg(
        long,
        default_value = "1",
        help = "Seconds to wait between capability probe attempts"
    )]
    pub capability_probe_interval: u64,

    #[arg(
        long,
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds a single capability probe may take before it counts as failed"
    )]
    pub capability_probe_timeout: u64,

    #[arg(
        long,
        default_value = "5",
        help = "Seconds to wait before re-establishing a failed watch"
    )]
    pub crd_watch_reconnect_interval: u64,
}

impl CapabilityArgs {
    pub fn crd_watch_reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.crd_watch_reconnect_interval)
    }
}

impl From<&CapabilityArgs> for RetryPolicy {
    fn from(args: &CapabilityArgs) -> Self {
        Self {
            max_attempts: args.capability_probe_attempts,
            interval: Duration::from_secs(args.capability_probe_interval),
            attempt_timeout: Duration::from_secs(args.capability_probe_timeout),
        }
    }
}
