use std::sync::Arc;

use mock_server::Backend;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    // Local development account; the admin username unlocks dashboard stats.
    let backend = Backend::new().with_user("admin", "admin@localhost", "admin");
    info!(%addr, "mock backend listening, API under /api");
    mock_server::run_with(listener, Arc::new(backend)).await
}
