use reward_backend::{create_router, logging, AppState, BackendConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::setup()?;

    let config = BackendConfig::from_env();
    let state = AppState::from_config(&config);
    {
        let ledger = state.ledger.lock().await;
        info!(
            "🎉 Event \"{}\" open until {} with {} spins",
            ledger.details.title, ledger.details.ends_at, ledger.budget.max_turns
        );
    }
    if config.api_token.is_none() {
        info!("No REWARD_API_TOKEN set, event routes are open");
    }

    let app = create_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    info!("listening on {}", config.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
