use anyhow::Result;
use clap::Parser;
use purplepill::app::Application;
use purplepill::config::DaemonArgs;
use purplepill::logging;
use utils::version;

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

    let args = DaemonArgs::parse();
    let _guard = logging::init(&args.log_file);

    tracing::info!(
        branch = version::branch(),
        "Starting cm-purplepill {}",
        &**version::VERSION
    );

    let app = Application::build(&args);
    if let Err(e) = app.run().await {
        tracing::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
