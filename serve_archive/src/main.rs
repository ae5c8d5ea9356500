use clap::Parser;

use serve_archive::{logging, routes, Args, ServerConfig, ServerState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from(Args::parse());
    logging::init(config.logging);

    if !config.loading_path.is_dir() {
        tracing::warn!(
            loading_path = %config.loading_path.display(),
            "Archive folder does not exist yet, every request will be a 404"
        );
    }

    tracing::info!(
        loading_path = %config.loading_path.display(),
        delay_secs = config.delay.as_secs(),
        zip_program = %config.zip_program,
        "Configuration loaded"
    );

    let addr = config.bind_address;
    let state = ServerState::from_config(config);

    // Run server with graceful shutdown on Ctrl+C
    let (addr, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Server shutting down");
    })?;

    println!("Serving on http://{addr}");
    println!("Press Ctrl+C to stop the server");
    server.await;

    Ok(())
}
