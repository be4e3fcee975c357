use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::state::AppState;
use server::utils::{hash, session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // `server hash-password <password>` prints a value for `auth.admin_password_hash`.
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("hash-password") {
        let password = args
            .next()
            .ok_or_else(|| anyhow::anyhow!("usage: server hash-password <password>"))?;
        println!("{}", hash::hash_password(&password)?);
        return Ok(());
    }

    let config = AppConfig::load()?;
    let blob_store = server::storage::open_blob_store(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_interval = Duration::from_secs(config.auth.sweep_interval_secs.max(1));

    let state = AppState::new(config, blob_store);
    session::spawn_session_sweeper(state.sessions.clone(), sweep_interval);

    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
