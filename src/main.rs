use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vocab_quiz_backend::{
    build_app,
    config::{get_config, init_config},
    database::{pool::create_pool, schema::initialize_database},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vocab_quiz_backend=info,tower_http=info")),
        )
        .init();

    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    initialize_database(&pool).await?;

    let app_state = AppState::new(pool)?;
    info!(
        generation_models = ?config.generation_models,
        vision_models = ?config.vision_models,
        session_ttl_secs = config.session_ttl.as_secs(),
        "services initialized"
    );

    let app = build_app(app_state, config.public_rps);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
