//! A greeting web service with axum.

use greeting_service::{
    infra::{config, logging},
    server,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    let config = config::load_config()?;
    let _guard = logging::init_logging(&config.logging);

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    server::run_app(listener, config.server).await?;

    Ok(())
}
