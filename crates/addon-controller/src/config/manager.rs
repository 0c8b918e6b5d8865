use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct ManagerArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "SHARD_KEY",
        default_value = "",
        help = "When set, only the ClusterSummary controller runs and serves clusters matching this shard"
    )]
    pub shard_key: String,

    #[arg(
        long,
        env = "CONCURRENT_RECONCILES",
        default_value = "10",
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Maximum number of reconciles in flight per controller"
    )]
    pub concurrent_reconciles: u16,

    #[arg(
        long,
        env = "SYNC_PERIOD",
        default_value = "600",
        help = "Seconds between full re-lists of every watched resource, 0 disables resync"
    )]
    pub sync_period: u64,
}

impl ManagerArgs {
    pub fn is_sharded(&self) -> bool {
        !self.shard_key.is_empty()
    }

    pub fn sync_period(&self) -> Option<Duration> {
        (self.sync_period > 0).then(|| Duration::from_secs(self.sync_period))
    }
}
