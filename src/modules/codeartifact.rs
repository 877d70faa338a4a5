use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_codeartifact::error::DisplayErrorContext;
use aws_sdk_codeartifact::types::PackageFormat as SdkPackageFormat;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{PackageFormat, ReauthSettings, RepositoryConfig};

/// Result of one successful authentication round
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub upstream_url: String,
    pub token: String,
    pub refreshed_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("upstream_url", &self.upstream_url)
            .field("token", &mask_token(&self.token))
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

/// Anything able to produce a fresh token/endpoint pair
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn authenticate(&self) -> AppResult<Credentials>;
}

/// CodeArtifact backed credential source
pub struct CodeArtifactClient {
    client: aws_sdk_codeartifact::Client,
    repository: RepositoryConfig,
    token_duration: Duration,
    call_timeout: Duration,
}

impl CodeArtifactClient {
    /// Build a client from the default AWS provider chain (env, profile, IMDS, ...)
    pub async fn from_env(repository: RepositoryConfig, settings: &ReauthSettings) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: aws_sdk_codeartifact::Client::new(&sdk_config),
            repository,
            token_duration: settings.token_duration,
            call_timeout: settings.auth_timeout,
        }
    }

    async fn get_authorization_token(&self) -> AppResult<String> {
        let request = self
            .client
            .get_authorization_token()
            .domain(&self.repository.domain)
            .set_domain_owner(self.repository.domain_owner.clone())
            .duration_seconds(self.token_duration.as_secs() as i64)
            .send();

        let response = with_deadline("GetAuthorizationToken", self.call_timeout, request)
            .await?
            .map_err(|e| AppError::Auth(DisplayErrorContext(&e).to_string()))?;

        response
            .authorization_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Auth("response did not contain a token".to_string()))
    }

    async fn get_repository_endpoint(&self) -> AppResult<String> {
        let request = self
            .client
            .get_repository_endpoint()
            .domain(&self.repository.domain)
            .set_domain_owner(self.repository.domain_owner.clone())
            .format(sdk_format(self.repository.format))
            .repository(&self.repository.repository)
            .send();

        let response = with_deadline("GetRepositoryEndpoint", self.call_timeout, request)
            .await?
            .map_err(|e| AppError::Endpoint(DisplayErrorContext(&e).to_string()))?;

        response
            .repository_endpoint()
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Endpoint("response did not contain an endpoint".to_string()))
    }
}

#[async_trait]
impl CredentialSource for CodeArtifactClient {
    async fn authenticate(&self) -> AppResult<Credentials> {
        tracing::info!(
            domain = %self.repository.domain,
            repository = %self.repository.repository,
            format = %self.repository.format,
            "Authenticating against CodeArtifact"
        );

        let token = self.get_authorization_token().await?;
        let refreshed_at = Utc::now();
        tracing::info!("Authorization successful");
        tracing::debug!("Issued token {}", mask_token(&token));

        let upstream_url = self.get_repository_endpoint().await?;
        tracing::info!("Requests will now be proxied to {}", upstream_url);

        Ok(Credentials {
            upstream_url,
            token,
            refreshed_at,
        })
    }
}

fn sdk_format(format: PackageFormat) -> SdkPackageFormat {
    match format {
        PackageFormat::Pypi => SdkPackageFormat::Pypi,
        PackageFormat::Maven => SdkPackageFormat::Maven,
        PackageFormat::Npm => SdkPackageFormat::Npm,
        PackageFormat::Nuget => SdkPackageFormat::Nuget,
    }
}

/// Bound an external call so a hung endpoint cannot stall the freshness check
async fn with_deadline<F, T>(operation: &'static str, deadline: Duration, call: F) -> AppResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| AppError::Timeout {
            operation,
            seconds: deadline.as_secs(),
        })
}

/// Show only enough of a token to correlate log lines
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "<empty>".to_string();
    }
    format!("{}...", token.chars().take(6).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "<empty>");
        assert_eq!(mask_token("eyJ2ZXIiOjEsImlzdSI6"), "eyJ2ZX...");
        assert_eq!(mask_token("abc"), "abc...");
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = Credentials {
            upstream_url: "https://acme-123.d.codeartifact.eu-west-1.amazonaws.com/pypi/libs/".into(),
            token: "supersecrettokenvalue".into(),
            refreshed_at: Utc::now(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("supersecrettokenvalue"));
        assert!(rendered.contains("supers..."));
    }

    #[test]
    fn test_sdk_format_mapping() {
        assert_eq!(sdk_format(PackageFormat::Pypi), SdkPackageFormat::Pypi);
        assert_eq!(sdk_format(PackageFormat::Npm), SdkPackageFormat::Npm);
        assert_eq!(sdk_format(PackageFormat::Maven), SdkPackageFormat::Maven);
        assert_eq!(sdk_format(PackageFormat::Nuget), SdkPackageFormat::Nuget);
    }

    #[tokio::test]
    async fn test_deadline_reports_operation() {
        let err = with_deadline(
            "GetAuthorizationToken",
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Timeout { operation: "GetAuthorizationToken", .. }
        ));
    }
}
