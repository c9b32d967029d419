use anyhow::Context;
use merge_arcade_server::api::router;
use merge_arcade_server::config::ServerConfig;
use merge_arcade_server::db::StoreHandle;
use merge_arcade_server::game_loop::{run_game_loop, GameCommand};
use merge_arcade_server::store::Store;
use merge_arcade_server::ws::AppState;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid server configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }
    if config.admin_password.is_none() {
        tracing::warn!("ARCADE_ADMIN_PASSWORD is not set, admin API disabled");
    }

    let store = match &config.data_path {
        Some(path) => Store::load(path)
            .with_context(|| format!("loading data snapshot {}", path.display()))?,
        None => {
            tracing::warn!("No data path configured, scores are kept in memory only");
            Store::new()
        }
    };
    tracing::info!(
        "Loaded {} users and {} scores",
        store.user_count(),
        store.score_count()
    );
    let store = StoreHandle::spawn(store, config.data_path.clone());

    // Spawn game loop
    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
    let game_config = config.clone();
    let game_store = store.clone();
    tokio::spawn(async move {
        run_game_loop(game_rx, game_config, game_store).await;
    });

    let listen_addr = config.listen_addr.clone();
    let app = router(AppState::new(game_tx, store, config));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {}", listen_addr))?;
    tracing::info!("Merge arcade server listening on {}", listen_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
