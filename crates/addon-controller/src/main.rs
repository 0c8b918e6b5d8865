use anyhow::Result;
use clap::Parser;
use utils::version;

use addon_controller::app::ApplicationBuilder;
use addon_controller::config::Cli;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = utils::logging::init(cli.logging.log_format, cli.logging.log_dir.as_deref());

    tracing::info!("Starting addon-controller {}", &**version::VERSION);

    let app = ApplicationBuilder::new(cli).build().await?;
    app.run().await?;

    tracing::info!("addon-controller stopped");
    Ok(())
}
