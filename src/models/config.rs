use crate::proxy::ProxyConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Package format the repository endpoint is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageFormat {
    #[default]
    Pypi,
    Maven,
    Npm,
    Nuget,
}

impl PackageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageFormat::Pypi => "pypi",
            PackageFormat::Maven => "maven",
            PackageFormat::Npm => "npm",
            PackageFormat::Nuget => "nuget",
        }
    }

    /// Resolve the configured value, falling back to pypi when it is unset,
    /// empty or not one of the known formats.
    ///
    /// Returns the format and whether a fallback happened for a non-empty value.
    pub fn resolve(raw: Option<&str>) -> (Self, bool) {
        match raw.map(str::trim) {
            None | Some("") => (PackageFormat::Pypi, false),
            Some(value) => match value.parse() {
                Ok(format) => (format, false),
                Err(_) => (PackageFormat::Pypi, true),
            },
        }
    }
}

impl FromStr for PackageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pypi" => Ok(PackageFormat::Pypi),
            "maven" => Ok(PackageFormat::Maven),
            "npm" => Ok(PackageFormat::Npm),
            "nuget" => Ok(PackageFormat::Nuget),
            other => Err(format!("Unknown package format: {}", other)),
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which CodeArtifact repository the gateway fronts
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub domain: String,
    /// Account that owns the domain. Omitted from every CodeArtifact call when absent.
    pub domain_owner: Option<String>,
    pub repository: String,
    pub format: PackageFormat,
}

/// Credential refresh timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReauthSettings {
    /// How often the freshness check runs
    pub tick_interval: Duration,
    /// Token age after which a proactive refresh is attempted
    pub refresh_after: Duration,
    /// Token age after which the gateway must stop serving
    pub fatal_after: Duration,
    /// Validity requested from the token service
    pub token_duration: Duration,
    /// Deadline for each call to the token service
    pub auth_timeout: Duration,
}

impl Default for ReauthSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(15),
            refresh_after: Duration::from_secs(45 * 60),
            fatal_after: Duration::from_secs(60 * 60),
            token_duration: Duration::from_secs(3600),
            auth_timeout: Duration::from_secs(30),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub repository: RepositoryConfig,
    pub proxy: ProxyConfig,
    pub reauth: ReauthSettings,
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<std::path::PathBuf>,
    /// Package format value that was not recognized and replaced by the default
    pub rejected_format: Option<String>,
}
