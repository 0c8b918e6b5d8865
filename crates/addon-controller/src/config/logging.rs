use std::path::PathBuf;

use clap::Parser;
use utils::logging::LogFormat;

#[derive(Parser, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long,
        env = "LOG_FORMAT",
        default_value_t = LogFormat::Text,
        help = "Log output format: text or json"
    )]
    pub log_format: LogFormat,

    #[arg(
        long,
        env = "LOG_DIR",
        value_hint = clap::ValueHint::DirPath,
        help = "Directory for daily rolling log files, in addition to stderr"
    )]
    pub log_dir: Option<PathBuf>,
}
