//! HTTP API server command.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use hostdb::api::state::ApiState;
use hostdb::auth::TokenStore;
use hostdb::config::HostdbConfig;
use hostdb::error::Error;
use hostdb::virt::BackendRegistry;
use hostdb::Result;

/// Start the HTTP API server.
#[derive(Parser, Debug)]
pub struct ServeCmd {
    /// Listen address (overrides the config file).
    #[arg(short, long)]
    listen: Option<String>,
}

impl ServeCmd {
    /// Run the serve command.
    pub fn run(self, config: &HostdbConfig) -> Result<()> {
        let addr: SocketAddr = match &self.listen {
            Some(listen) => listen.parse().map_err(|e| {
                Error::Config(format!("invalid listen address '{}': {}", listen, e))
            })?,
            None => config.listen_addr()?,
        };

        let runtime = tokio::runtime::Runtime::new().map_err(Error::Io)?;
        runtime.block_on(run_server(config, addr))
    }
}

async fn run_server(config: &HostdbConfig, addr: SocketAddr) -> Result<()> {
    let repository = super::open_repository(config)?;
    let backends = BackendRegistry::from_config(&config.backends)?;
    if config.tokens.is_empty() {
        tracing::warn!("no api tokens configured, every request is anonymous");
    }

    let state = Arc::new(ApiState::new(
        Arc::new(repository),
        backends,
        TokenStore::new(&config.tokens),
    ));
    let app = hostdb::api::create_router(state, config.request_timeout()?);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::Io)?;

    tracing::info!(address = %addr, "starting HTTP API server");
    println!("hostdb API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::Io)?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
