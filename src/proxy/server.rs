use crate::error::{AppError, AppResult};
use crate::proxy::config::ProxyConfig;
use crate::proxy::credential_store::CredentialStore;
use crate::proxy::request_context::RequestContextRegistry;
use crate::proxy::upstream::client::UpstreamClient;
use axum::{extract::ConnectInfo, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub contexts: Arc<RequestContextRegistry>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(credentials: Arc<CredentialStore>, config: &ProxyConfig) -> AppResult<Self> {
        Ok(Self {
            credentials,
            contexts: Arc::new(RequestContextRegistry::new()),
            upstream: Arc::new(UpstreamClient::new(
                config.request_timeout,
                Some(&config.upstream_proxy),
            )?),
        })
    }
}

/// Every method and path goes upstream
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::{handlers, middleware};

    Router::new()
        .fallback(handlers::registry::handle_proxy)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::capture_client_context,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown: CancellationToken,
    local_addr: SocketAddr,
}

impl AxumServer {
    /// Start Axum server
    ///
    /// The accept loop ends when `shutdown` is cancelled or [`AxumServer::stop`] is called.
    pub async fn start(
        config: &ProxyConfig,
        state: AppState,
        shutdown: CancellationToken,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let app = build_router(state);

        // Bind address
        let addr = config.listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind address {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Reverse proxy server started at http://{}", local_addr);

        let server_instance = Self {
            shutdown: shutdown.clone(),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(
                                    app.clone().layer(Extension(ConnectInfo(peer))),
                                );

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("Reverse proxy server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
