//! Identity-linked role reconciliation.
//!
//! The one operation the old maintenance scripts kept reimplementing:
//! take an identity (email, optional provider UID) and a desired role, and
//! make sure exactly one user record exists with that role. Creation policy
//! is explicit via [`Mode`]; every other field of the record is left alone.

use crate::error::Result;
use crate::users::model::{Identity, Role, UserRecord};
use crate::users::store::UserStore;

/// What to do when no record exists for the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report [`Outcome::NotFound`] rather than create.
    Strict,
    /// Create a minimal record with defaults.
    Upsert,
}

/// Result of a reconciliation, carrying the record snapshot where one exists.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// No record existed; a minimal one was created with the desired role.
    Created(UserRecord),
    /// The record existed with a different role; role and `updated_at` were
    /// rewritten, nothing else.
    Updated(UserRecord),
    /// The record already carried the desired role; no write was performed.
    Unchanged(UserRecord),
    /// Strict mode and no record for this email. Not an error; callers
    /// branch on it.
    NotFound,
}

impl Outcome {
    pub fn record(&self) -> Option<&UserRecord> {
        match self {
            Self::Created(r) | Self::Updated(r) | Self::Unchanged(r) => Some(r),
            Self::NotFound => None,
        }
    }
}

/// Ensure exactly one record exists for `identity` with `desired_role`.
///
/// Idempotent: repeating the call with the same arguments yields
/// [`Outcome::Unchanged`] and performs no further write. The write itself is
/// the store's single atomic conditional upsert, so only `role` and
/// `updated_at` can change on an existing record; `external_id` and
/// `created_at` are set at creation only.
pub async fn reconcile(
    store: &dyn UserStore,
    identity: &Identity,
    desired_role: Role,
    mode: Mode,
) -> Result<Outcome> {
    match store.find_by_email(identity.email()).await? {
        None => match mode {
            Mode::Strict => Ok(Outcome::NotFound),
            Mode::Upsert => {
                let record = store
                    .upsert_role(identity.email(), desired_role, identity.external_id())
                    .await?;
                Ok(Outcome::Created(record))
            }
        },
        Some(existing) if existing.role == desired_role => Ok(Outcome::Unchanged(existing)),
        Some(_) => {
            let record = store
                .upsert_role(identity.email(), desired_role, identity.external_id())
                .await?;
            Ok(Outcome::Updated(record))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::users::memory::MemoryUserStore;
    use futures::StreamExt;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn identity(email: &str) -> Identity {
        Identity::new(email, None).expect("valid test email")
    }

    fn seeded(email: &str, role: Role) -> UserRecord {
        let now = OffsetDateTime::now_utc();
        UserRecord {
            id: Uuid::new_v4(),
            external_id: None,
            email: email.to_owned(),
            role,
            profile: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_on_empty_store_creates_admin() {
        let store = MemoryUserStore::new();
        let outcome = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap();

        let record = match outcome {
            Outcome::Created(r) => r,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.role, Role::Admin);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn existing_student_is_elevated() {
        let store = MemoryUserStore::new();
        store.insert(seeded("a@x.com", Role::Student)).await;

        let outcome = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap();

        match outcome {
            Outcome::Updated(r) => assert_eq!(r.role, Role::Admin),
            other => panic!("expected Updated, got {other:?}"),
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn repeat_call_is_unchanged_and_writes_nothing() {
        let store = MemoryUserStore::new();
        store.insert(seeded("a@x.com", Role::Student)).await;
        let id = identity("a@x.com");

        let first = reconcile(&store, &id, Role::Admin, Mode::Upsert).await.unwrap();
        let updated_at = first.record().unwrap().updated_at;
        let writes = store.write_count();

        let second = reconcile(&store, &id, Role::Admin, Mode::Upsert).await.unwrap();
        match second {
            Outcome::Unchanged(r) => {
                assert_eq!(r.role, Role::Admin);
                assert_eq!(r.updated_at, updated_at);
            }
            other => panic!("expected Unchanged, got {other:?}"),
        }
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn strict_mode_on_unknown_email_is_not_found_without_side_effects() {
        let store = MemoryUserStore::new();
        let outcome = reconcile(&store, &identity("b@x.com"), Role::Admin, Mode::Strict)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::NotFound));
        assert!(store.is_empty().await);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn strict_mode_still_updates_an_existing_record() {
        let store = MemoryUserStore::new();
        store.insert(seeded("a@x.com", Role::Student)).await;

        let outcome = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Strict)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Updated(_)));
    }

    #[tokio::test]
    async fn empty_email_is_rejected_before_any_call() {
        let err = Identity::new("", None).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
    }

    #[tokio::test]
    async fn reconciliation_leaves_profile_and_link_untouched() {
        let store = MemoryUserStore::new();
        let mut record = seeded("a@x.com", Role::Student);
        record.external_id = Some("firebase-uid-1".into());
        record.profile = serde_json::json!({
            "name": "Dee",
            "current_skills": ["rust"],
            "saved_roadmaps": [1, 2],
        });
        let original = record.clone();
        store.insert(record).await;

        let outcome = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap();
        let after = outcome.record().unwrap();

        assert_eq!(after.id, original.id);
        assert_eq!(after.external_id, original.external_id);
        assert_eq!(after.profile, original.profile);
        assert_eq!(after.created_at, original.created_at);
        assert_eq!(after.role, Role::Admin);
    }

    #[tokio::test]
    async fn external_id_is_not_relinked_on_update() {
        let store = MemoryUserStore::new();
        store.insert(seeded("a@x.com", Role::Student)).await;

        let id = Identity::new("a@x.com", Some("late-uid")).unwrap();
        reconcile(&store, &id, Role::Admin, Mode::Upsert).await.unwrap();

        let record = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(record.external_id, None);
    }

    #[tokio::test]
    async fn repeated_upserts_never_duplicate_a_record() {
        let store = MemoryUserStore::new();
        let id = identity("a@x.com");
        for role in [Role::Admin, Role::Student, Role::Admin, Role::Admin] {
            reconcile(&store, &id, role, Mode::Upsert).await.unwrap();
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn mixed_case_email_folds_onto_one_record() {
        let store = MemoryUserStore::new();
        reconcile(&store, &identity("A@X.com"), Role::Student, Mode::Upsert)
            .await
            .unwrap();
        let outcome = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Updated(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_email_in_store_is_a_fatal_error() {
        let store = MemoryUserStore::new();
        store.insert(seeded("a@x.com", Role::Student)).await;
        store.insert(seeded("a@x.com", Role::Admin)).await;

        let err = reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail(ref e) if e == "a@x.com"));
    }

    #[tokio::test]
    async fn list_users_sees_reconciled_records() {
        let store = MemoryUserStore::new();
        reconcile(&store, &identity("a@x.com"), Role::Admin, Mode::Upsert)
            .await
            .unwrap();
        reconcile(&store, &identity("b@x.com"), Role::Student, Mode::Upsert)
            .await
            .unwrap();

        let mut emails: Vec<String> = Vec::new();
        let mut users = store.list_users();
        while let Some(user) = users.next().await {
            emails.push(user.unwrap().email);
        }
        emails.sort();
        assert_eq!(emails, ["a@x.com", "b@x.com"]);
    }
}
