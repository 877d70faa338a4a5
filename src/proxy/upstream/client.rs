// Upstream client implementation
// Forwards client requests to the CodeArtifact repository endpoint

use base64::Engine as _;
use bytes::Bytes;
use reqwest::{header, Client, Method, Response};

use crate::error::AppResult;
use crate::proxy::config::UpstreamProxyConfig;

/// Username CodeArtifact expects alongside the authorization token
const BASIC_AUTH_USER: &str = "aws";

/// Connection-scoped headers that must not cross the proxy
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
];

pub fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str()) || name == header::UPGRADE
}

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(request_timeout: u64, proxy_config: Option<&UpstreamProxyConfig>) -> AppResult<Self> {
        let http_client = crate::utils::http::create_client_with_proxy(request_timeout, proxy_config)?;
        Ok(Self { http_client })
    }

    /// Build the upstream URL for a client path
    ///
    /// `path_and_query` is appended below the repository base path.
    pub fn build_url(base_url: &str, path_and_query: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path_and_query.trim_start_matches('/')
        )
    }

    /// Send a client request upstream with the repository token attached
    ///
    /// The client's own `Host` and `Authorization` are replaced; the host comes
    /// from the target URL.
    pub async fn forward(
        &self,
        method: Method,
        url: &str,
        client_headers: &header::HeaderMap,
        token: &str,
        body: Bytes,
    ) -> AppResult<Response> {
        let mut headers = header::HeaderMap::with_capacity(client_headers.len() + 1);
        for (name, value) in client_headers {
            if is_hop_by_hop(name)
                || name == header::HOST
                || name == header::AUTHORIZATION
                || name == header::CONTENT_LENGTH
            {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        headers.insert(header::AUTHORIZATION, basic_auth_header(token)?);

        let response = self
            .http_client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        Ok(response)
    }
}

/// `Authorization: Basic base64(aws:<token>)`
pub fn basic_auth_header(token: &str) -> AppResult<header::HeaderValue> {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", BASIC_AUTH_USER, token));
    let mut value = header::HeaderValue::from_str(&format!("Basic {}", encoded))
        .map_err(|e| crate::error::AppError::Auth(e.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let base = "https://acme-123.d.codeartifact.us-east-1.amazonaws.com/pypi/libs/";
        assert_eq!(
            UpstreamClient::build_url(base, "/simple/foo/"),
            "https://acme-123.d.codeartifact.us-east-1.amazonaws.com/pypi/libs/simple/foo/"
        );
        assert_eq!(
            UpstreamClient::build_url(base, "/lodash?write=true"),
            "https://acme-123.d.codeartifact.us-east-1.amazonaws.com/pypi/libs/lodash?write=true"
        );
        assert_eq!(
            UpstreamClient::build_url("https://host/npm/libs", "/"),
            "https://host/npm/libs/"
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let value = basic_auth_header("secret").unwrap();
        // base64("aws:secret")
        assert_eq!(value.to_str().unwrap(), "Basic YXdzOnNlY3JldA==");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING));
        assert!(is_hop_by_hop(&header::UPGRADE));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
        assert!(!is_hop_by_hop(&header::ACCEPT_ENCODING));
    }
}
