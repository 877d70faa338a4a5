use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::models::ReauthSettings;
use crate::modules::codeartifact::CredentialSource;
use crate::proxy::credential_store::CredentialStore;

/// What a single freshness check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Token is younger than the refresh threshold
    Fresh,
    Refreshed,
    /// Refresh was due but failed; the next tick retries
    RefreshFailed,
    /// Token is past its validity window
    Expired { age_minutes: i64 },
}

/// Keeps the shared credential state fresh
///
/// Owns the startup authentication and the periodic reauth loop.
pub struct TokenManager {
    store: Arc<CredentialStore>,
    source: Arc<dyn CredentialSource>,
    settings: ReauthSettings,
}

impl TokenManager {
    pub fn new(
        store: Arc<CredentialStore>,
        source: Arc<dyn CredentialSource>,
        settings: ReauthSettings,
    ) -> Self {
        Self {
            store,
            source,
            settings,
        }
    }

    pub fn store(&self) -> Arc<CredentialStore> {
        self.store.clone()
    }

    /// Fetch a new token/endpoint pair and publish it
    ///
    /// The store is untouched when the source fails.
    pub async fn authenticate(&self) -> AppResult<()> {
        let credentials = self.source.authenticate().await?;
        self.store.replace(credentials).await;
        Ok(())
    }

    /// Evaluate freshness once, refreshing when due
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let snapshot = self.store.snapshot().await;
        let age = snapshot
            .age(now)
            .and_then(|age| age.to_std().ok())
            .unwrap_or(Duration::ZERO);

        if snapshot.is_authenticated() && age > self.settings.fatal_after {
            return TickOutcome::Expired {
                age_minutes: (age.as_secs() / 60) as i64,
            };
        }

        if snapshot.is_authenticated() && age <= self.settings.refresh_after {
            return TickOutcome::Fresh;
        }

        if snapshot.is_authenticated() {
            let remaining = self.settings.fatal_after.saturating_sub(age);
            tracing::info!(
                "{} minutes until the CodeArtifact token expires, attempting a reauth",
                remaining.as_secs() / 60
            );
        } else {
            tracing::info!("No CodeArtifact token held yet, attempting authentication");
        }

        match self.authenticate().await {
            Ok(()) => TickOutcome::Refreshed,
            Err(e) => {
                tracing::error!("Reauthentication failed, will retry on next check: {}", e);
                TickOutcome::RefreshFailed
            }
        }
    }

    /// Run freshness checks until cancelled
    ///
    /// Returns an error once the token is older than the fatal threshold; the
    /// caller must stop serving at that point.
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<()> {
        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Reauth check started (every {}s, refresh after {}m, give up after {}m)",
            self.settings.tick_interval.as_secs(),
            self.settings.refresh_after.as_secs() / 60,
            self.settings.fatal_after.as_secs() / 60
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reauth check stopped");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            if let TickOutcome::Expired { age_minutes } = self.tick(Utc::now()).await {
                tracing::error!(
                    "CodeArtifact token is {} minutes old, refusing to keep serving",
                    age_minutes
                );
                return Err(AppError::CredentialExpired { age_minutes });
            }
        }
    }
}
