pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Proxy service module
pub mod utils;

use std::sync::Arc;

use error::AppResult;
use models::AppConfig;
use modules::codeartifact::{CodeArtifactClient, CredentialSource};
use modules::logger;
use proxy::server::AppState;
use proxy::{AxumServer, CredentialStore, TokenManager};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Process entry point, returns the exit code
pub async fn run() -> i32 {
    let config = match modules::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init_logger(None);
            error!("Failed to load configuration: {}", e);
            return 1;
        }
    };

    logger::init_logger(config.log_dir.as_deref());
    modules::config::report_config_warnings(&config);

    let source = Arc::new(CodeArtifactClient::from_env(config.repository.clone(), &config.reauth).await);

    match serve(config, source, shutdown_signal()).await {
        Ok(()) => {
            info!("CodeArtifact proxy stopped");
            0
        }
        Err(e) => {
            error!("CodeArtifact proxy terminated: {}", e);
            1
        }
    }
}

/// Authenticate, start the reauth loop and serve until `shutdown` resolves
///
/// Fails when the first authentication fails, when the listener cannot bind, or
/// when the token ages past its validity window.
pub async fn serve<S>(
    config: AppConfig,
    source: Arc<dyn CredentialSource>,
    shutdown: S,
) -> AppResult<()>
where
    S: std::future::Future<Output = ()>,
{
    let store = Arc::new(CredentialStore::new());
    let token_manager = Arc::new(TokenManager::new(store.clone(), source, config.reauth));

    // Nothing can be proxied without an endpoint and a token
    token_manager.authenticate().await?;

    let cancel = CancellationToken::new();
    let reauth = {
        let token_manager = token_manager.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { token_manager.run(cancel).await })
    };

    let state = AppState::new(store, &config.proxy)?;
    let (server, server_handle) = match AxumServer::start(&config.proxy, state, cancel.clone()).await {
        Ok(started) => started,
        Err(e) => {
            cancel.cancel();
            let _ = reauth.await;
            return Err(e);
        }
    };

    tokio::pin!(reauth);
    let result = tokio::select! {
        res = &mut reauth => res?,
        _ = shutdown => {
            info!("Shutdown signal received");
            cancel.cancel();
            reauth.await?
        }
    };

    server.stop();
    server_handle.await?;
    result
}

/// Resolves when the process receives a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm => {}
    }
}
