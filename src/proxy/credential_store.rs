use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::modules::codeartifact::Credentials;

/// Consistent view of the credential state taken under a single read lock
#[derive(Debug, Clone, Default)]
pub struct CredentialSnapshot {
    pub upstream_url: String,
    pub token: String,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl CredentialSnapshot {
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    /// Time elapsed since the last successful refresh
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.refreshed_at.map(|at| now - at)
    }

    /// Parsed upstream base, `None` before the first authentication
    pub fn upstream(&self) -> Option<url::Url> {
        url::Url::parse(&self.upstream_url).ok()
    }
}

/// Process-wide upstream URL and bearer token
///
/// Readers only ever see all three fields from the same refresh.
#[derive(Debug, Default)]
pub struct CredentialStore {
    state: RwLock<CredentialSnapshot>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> CredentialSnapshot {
        self.state.read().await.clone()
    }

    /// Replace url, token and refresh time together
    pub async fn replace(&self, credentials: Credentials) {
        let mut state = self.state.write().await;
        *state = CredentialSnapshot {
            upstream_url: credentials.upstream_url,
            token: credentials.token,
            refreshed_at: Some(credentials.refreshed_at),
        };
    }
}
