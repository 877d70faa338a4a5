use reqwest::{redirect, Client, Proxy};

use crate::error::AppResult;
use crate::proxy::config::UpstreamProxyConfig;

/// Create an HTTP client for talking to the registry upstream
///
/// Redirects are never followed: the gateway hands them back to the client
/// (after rewriting) instead.
pub fn create_client_with_proxy(
    timeout_secs: u64,
    proxy_config: Option<&UpstreamProxyConfig>,
) -> AppResult<Client> {
    let mut builder = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .redirect(redirect::Policy::none());

    if let Some(config) = proxy_config {
        if config.enabled && !config.url.is_empty() {
            match Proxy::all(&config.url) {
                Ok(proxy) => {
                    builder = builder.proxy(proxy);
                    tracing::info!("HTTP client upstream proxy enabled: {}", config.url);
                }
                Err(e) => {
                    tracing::error!("Invalid proxy address: {}, error: {}", config.url, e);
                }
            }
        }
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_proxy_is_ignored() {
        let config = UpstreamProxyConfig {
            enabled: true,
            url: "not a proxy url".to_string(),
        };
        assert!(create_client_with_proxy(30, Some(&config)).is_ok());
    }

    #[test]
    fn test_disabled_proxy() {
        let config = UpstreamProxyConfig::default();
        assert!(create_client_with_proxy(30, Some(&config)).is_ok());
        assert!(create_client_with_proxy(30, None).is_ok());
    }
}
