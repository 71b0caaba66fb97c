use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::users::model::{Role, UserRecord};

/// The record-store capability the reconciler depends on.
///
/// Implementations must make `upsert_role` a single atomic conditional write
/// (match by email, set `role` and `updated_at`), never a separate read
/// followed by a separate write. That closes the race where two concurrent
/// reconciliations of one identity interleave a stale read with a write.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Point lookup by (normalized) email.
    ///
    /// Returns `Error::DuplicateEmail` if the store holds more than one
    /// record for the address; the uniqueness constraint was violated
    /// externally and must not be papered over.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Atomically set `role` on the record with this email, refreshing
    /// `updated_at` only when the stored role actually changes. Creates a
    /// minimal record with defaults when none exists; `external_id` is
    /// written at creation only. No other field is touched.
    async fn upsert_role(
        &self,
        email: &str,
        role: Role,
        external_id: Option<&str>,
    ) -> Result<UserRecord>;

    /// Every record, lazily, in the store's natural iteration order.
    /// Read-only; the stream is finite and cannot be restarted.
    fn list_users(&self) -> BoxStream<'_, Result<UserRecord>>;
}
