// Tests for the usage/plan row contract.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lingua_live::account::{AccountRow, AccountStore, PlanTier};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory stand-in for the REST row store.
#[derive(Default)]
struct MemoryStore {
    rows: Mutex<HashMap<String, AccountRow>>,
}

impl MemoryStore {
    fn with_row(user_id: &str, usage_count: u64, plan: PlanTier) -> Self {
        let store = Self::default();
        store.rows.lock().unwrap().insert(
            user_id.to_string(),
            AccountRow {
                user_id: user_id.to_string(),
                usage_count,
                plan,
            },
        );
        store
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<AccountRow>> {
        Ok(self.rows.lock().unwrap().get(user_id).cloned())
    }

    async fn increment_usage(&self, user_id: &str) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(user_id)
            .with_context(|| format!("No account row for user {}", user_id))?;
        row.usage_count += 1;
        Ok(row.usage_count)
    }
}

#[tokio::test]
async fn test_fetch_returns_none_for_unknown_user() {
    let store = MemoryStore::default();
    assert!(store.fetch("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_increment_bumps_usage_by_one() {
    let store = MemoryStore::with_row("user-1", 4, PlanTier::Free);

    assert_eq!(store.increment_usage("user-1").await.unwrap(), 5);
    assert_eq!(store.increment_usage("user-1").await.unwrap(), 6);

    let row = store.fetch("user-1").await.unwrap().unwrap();
    assert_eq!(row.usage_count, 6);
    assert_eq!(row.plan, PlanTier::Free);
}

#[tokio::test]
async fn test_increment_fails_without_a_row() {
    let store = MemoryStore::default();
    assert!(store.increment_usage("nobody").await.is_err());
}

#[test]
fn test_row_serde_uses_lowercase_plan_labels() {
    let row = AccountRow {
        user_id: "user-1".to_string(),
        usage_count: 2,
        plan: PlanTier::Pro,
    };

    let json = serde_json::to_string(&row).unwrap();
    assert!(json.contains("\"plan\":\"pro\""));

    let parsed: AccountRow = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.plan, PlanTier::Pro);
}
