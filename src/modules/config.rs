use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{AppConfig, PackageFormat, ReauthSettings, RepositoryConfig};
use crate::proxy::config::{ProxyConfig, UpstreamProxyConfig};

pub const ENV_DOMAIN: &str = "CODEARTIFACT_DOMAIN";
pub const ENV_OWNER: &str = "CODEARTIFACT_OWNER";
pub const ENV_REPO: &str = "CODEARTIFACT_REPO";
pub const ENV_TYPE: &str = "CODEARTIFACT_TYPE";
pub const ENV_LISTEN_PORT: &str = "LISTEN_PORT";
pub const ENV_LISTEN_HOST: &str = "LISTEN_HOST";
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
pub const ENV_AUTH_TIMEOUT: &str = "AUTH_TIMEOUT";
pub const ENV_UPSTREAM_PROXY_URL: &str = "UPSTREAM_PROXY_URL";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Load application config from the process environment
pub fn load_app_config() -> AppResult<AppConfig> {
    load_app_config_from(|key| std::env::var(key).ok())
}

/// Load application config through an arbitrary variable lookup
pub fn load_app_config_from<F>(lookup: F) -> AppResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let domain = required(&lookup, ENV_DOMAIN)?;
    let repository = required(&lookup, ENV_REPO)?;
    // An empty owner still counts as "set", matching how the variable is looked up upstream.
    let domain_owner = lookup(ENV_OWNER);

    let raw_format = lookup(ENV_TYPE);
    let (format, fell_back) = PackageFormat::resolve(raw_format.as_deref());
    let rejected_format = raw_format.filter(|_| fell_back);

    let mut proxy = ProxyConfig::default();
    if let Some(port) = lookup(ENV_LISTEN_PORT) {
        proxy.port = parse_number(ENV_LISTEN_PORT, &port)?;
    }
    if let Some(host) = lookup(ENV_LISTEN_HOST).filter(|h| !h.trim().is_empty()) {
        proxy.bind_address = host.trim().to_string();
    }
    if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
        proxy.request_timeout = parse_number(ENV_REQUEST_TIMEOUT, &timeout)?;
    }
    if let Some(url) = lookup(ENV_UPSTREAM_PROXY_URL).filter(|u| !u.trim().is_empty()) {
        proxy.upstream_proxy = UpstreamProxyConfig {
            enabled: true,
            url: url.trim().to_string(),
        };
    }

    let mut reauth = ReauthSettings::default();
    if let Some(timeout) = lookup(ENV_AUTH_TIMEOUT) {
        reauth.auth_timeout = Duration::from_secs(parse_number(ENV_AUTH_TIMEOUT, &timeout)?);
    }

    let log_dir = lookup(ENV_LOG_DIR)
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from);

    Ok(AppConfig {
        repository: RepositoryConfig {
            domain,
            domain_owner,
            repository,
            format,
        },
        proxy,
        reauth,
        log_dir,
        rejected_format,
    })
}

/// Log the configuration problems that were tolerated while loading
///
/// Runs after the logger is installed, loading happens before it.
pub fn report_config_warnings(config: &AppConfig) {
    if let Some(raw) = &config.rejected_format {
        tracing::warn!(
            "Unrecognized {} value {:?}, falling back to {}",
            ENV_TYPE,
            raw,
            config.repository.format
        );
    }
}

fn required<F>(lookup: &F, key: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} is not a valid number: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn load(vars: &[(&str, &str)]) -> AppResult<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_app_config_from(|key| map.get(key).cloned())
    }

    #[test]
    fn test_minimal_config() {
        let config = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs")]).unwrap();
        assert_eq!(config.repository.domain, "acme");
        assert_eq!(config.repository.repository, "libs");
        assert_eq!(config.repository.domain_owner, None);
        assert_eq!(config.repository.format, PackageFormat::Pypi);
        assert_eq!(config.proxy.port, 8080);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            (ENV_DOMAIN, "acme"),
            (ENV_REPO, "libs"),
            (ENV_OWNER, "123456789012"),
            (ENV_TYPE, "npm"),
            (ENV_LISTEN_PORT, "4873"),
            (ENV_LISTEN_HOST, "127.0.0.1"),
            (ENV_AUTH_TIMEOUT, "5"),
            (ENV_UPSTREAM_PROXY_URL, "socks5://127.0.0.1:1080"),
            (ENV_LOG_DIR, "/var/log/codeartifact-proxy"),
        ])
        .unwrap();
        assert_eq!(config.repository.domain_owner.as_deref(), Some("123456789012"));
        assert_eq!(config.repository.format, PackageFormat::Npm);
        assert_eq!(config.proxy.listen_addr(), "127.0.0.1:4873");
        assert_eq!(config.reauth.auth_timeout, Duration::from_secs(5));
        assert!(config.proxy.upstream_proxy.enabled);
        assert_eq!(
            config.log_dir,
            Some(PathBuf::from("/var/log/codeartifact-proxy"))
        );
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let config = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs"), (ENV_TYPE, "cargo")]).unwrap();
        assert_eq!(config.repository.format, PackageFormat::Pypi);
        assert_eq!(config.rejected_format.as_deref(), Some("cargo"));

        let config = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs"), (ENV_TYPE, "NPM")]).unwrap();
        assert_eq!(config.rejected_format, None);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured_warnings(config: &AppConfig) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || report_config_warnings(config));
        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_unknown_format_is_reported_once_logging_is_up() {
        let config = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs"), (ENV_TYPE, "cargo")]).unwrap();
        let output = captured_warnings(&config);
        assert!(output.contains("WARN"));
        assert!(output.contains("CODEARTIFACT_TYPE"));
        assert!(output.contains("\"cargo\""));
        assert!(output.contains("falling back to pypi"));

        let config = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs")]).unwrap();
        assert!(captured_warnings(&config).is_empty());
    }

    #[test]
    fn test_missing_domain_is_rejected() {
        let err = load(&[(ENV_REPO, "libs")]).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains(ENV_DOMAIN)));

        let err = load(&[(ENV_DOMAIN, "  "), (ENV_REPO, "libs")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = load(&[(ENV_DOMAIN, "acme"), (ENV_REPO, "libs"), (ENV_LISTEN_PORT, "http")])
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains(ENV_LISTEN_PORT)));
    }
}
