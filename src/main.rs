use std::sync::Arc;

use capacity_api::{AppState, ModelArtifact, ServerArgs, build_app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    let args: ServerArgs = argh::from_env();

    // the server never starts without a model
    let model = match ModelArtifact::load(&args.model) {
        Ok(model) => model,
        Err(e) => {
            log::error!("Failed to load model from {}: {e}", args.model.display());
            return Err(e.into());
        }
    };
    log::info!(
        "Loaded {} from {}",
        model.describe(),
        args.model.display()
    );

    let app = build_app(AppState::new(Arc::new(model), args.error_status()));

    let addr = args.addr();
    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
