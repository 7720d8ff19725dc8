use photomesh_api::setup::{routes, server};
use photomesh_api::state::AppState;
use photomesh_api::telemetry;
use photomesh_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    telemetry::init_telemetry();

    let config = Config::from_env()?;
    config.validate()?;

    let state = AppState::from_config(config.clone()).await?;

    // Reachability is informational; uploads degrade gracefully when the
    // analysis subsystem is down.
    if state.vision.health().await {
        tracing::info!(url = %config.vision_base_url(), "Vision service reachable");
    } else {
        tracing::warn!(
            url = %config.vision_base_url(),
            "Vision service unreachable, uploads will be stored without analysis"
        );
    }

    let app = routes::setup_routes(&config, state)?;
    server::start_server(&config, app).await?;

    Ok(())
}
