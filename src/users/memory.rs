use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::users::model::{Role, UserRecord};
use crate::users::store::UserStore;

/// In-memory `UserStore` backing the test harness and ad-hoc callers that
/// have no database at hand.
///
/// Keeps records in a plain `Vec` so tests can also seed the duplicate-email
/// corruption the real store's constraint forbids. `write_count` tracks
/// `upsert_role` calls, letting tests assert that idempotent reconciliations
/// perform no write at all.
#[derive(Default)]
pub struct MemoryUserStore {
    records: Mutex<Vec<UserRecord>>,
    writes: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as-is, bypassing the reconciler.
    pub async fn insert(&self, record: UserRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Number of `upsert_role` calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let records = self.records.lock().await;
        let mut matches = records.iter().filter(|r| r.email == email);
        let first = matches.next().cloned();
        if matches.next().is_some() {
            return Err(Error::DuplicateEmail(email.to_string()));
        }
        Ok(first)
    }

    async fn upsert_role(
        &self,
        email: &str,
        role: Role,
        external_id: Option<&str>,
    ) -> Result<UserRecord> {
        let mut records = self.records.lock().await;
        self.writes.fetch_add(1, Ordering::Relaxed);

        if let Some(record) = records.iter_mut().find(|r| r.email == email) {
            if record.role != role {
                record.role = role;
                record.updated_at = OffsetDateTime::now_utc();
            }
            return Ok(record.clone());
        }

        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            external_id: external_id.map(str::to_owned),
            email: email.to_owned(),
            role,
            profile: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    fn list_users(&self) -> BoxStream<'_, Result<UserRecord>> {
        async move {
            let snapshot = self.records.lock().await.clone();
            futures::stream::iter(snapshot.into_iter().map(Ok))
        }
        .flatten_stream()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_find() {
        let store = MemoryUserStore::new();
        store
            .upsert_role("a@x.com", Role::Admin, Some("uid-a"))
            .await
            .unwrap();

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.role, Role::Admin);
        assert_eq!(found.external_id.as_deref(), Some("uid-a"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn list_streams_every_record() {
        let store = MemoryUserStore::new();
        store.upsert_role("a@x.com", Role::Student, None).await.unwrap();
        store.upsert_role("b@x.com", Role::Admin, None).await.unwrap();

        let users: Vec<_> = store
            .list_users()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(users.len(), 2);
    }
}
