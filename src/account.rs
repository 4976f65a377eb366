//! Thin client for the external per-user usage/plan row.
//!
//! One row per user, owner-scoped on the server side. This service only
//! reads the row and bumps the usage counter; quota enforcement, if any,
//! lives elsewhere.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AccountConfig;

/// Subscription tier label stored on the account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

/// One per-user account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRow {
    pub user_id: String,
    pub usage_count: u64,
    pub plan: PlanTier,
}

/// Access to the account row store.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch the caller's row, if one exists.
    async fn fetch(&self, user_id: &str) -> Result<Option<AccountRow>>;

    /// Bump the usage counter by one. Returns the new count.
    async fn increment_usage(&self, user_id: &str) -> Result<u64>;
}

/// Supabase-style REST implementation.
pub struct RestAccountStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestAccountStore {
    pub fn from_config(config: &AccountConfig) -> Result<Self> {
        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => bail!("account store not configured"),
        };
        let api_key = config.api_key.clone().unwrap_or_default();

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    fn rows_url(&self, user_id: &str) -> String {
        format!(
            "{}/rest/v1/accounts?user_id=eq.{}",
            self.base_url, user_id
        )
    }
}

#[async_trait::async_trait]
impl AccountStore for RestAccountStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<AccountRow>> {
        let rows: Vec<AccountRow> = self
            .client
            .get(self.rows_url(user_id))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to fetch account row")?
            .error_for_status()
            .context("Account row fetch rejected")?
            .json()
            .await
            .context("Failed to parse account row")?;

        Ok(rows.into_iter().next())
    }

    async fn increment_usage(&self, user_id: &str) -> Result<u64> {
        let current = self
            .fetch(user_id)
            .await?
            .with_context(|| format!("No account row for user {}", user_id))?;

        let next = current.usage_count + 1;

        self.client
            .patch(self.rows_url(user_id))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "usage_count": next }))
            .send()
            .await
            .context("Failed to update usage counter")?
            .error_for_status()
            .context("Usage update rejected")?;

        info!("Usage for {} is now {}", user_id, next);

        Ok(next)
    }
}
