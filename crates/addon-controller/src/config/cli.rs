use clap::Parser;
use utils::version;

use crate::config::capability::CapabilityArgs;
use crate::config::logging::LoggingArgs;
use crate::config::manager::ManagerArgs;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(flatten)]
    pub manager: ManagerArgs,

    #[command(flatten)]
    pub capability: CapabilityArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}
