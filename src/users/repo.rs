use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::users::model::{Role, UserRecord};
use crate::users::store::UserStore;

/// `users` table access over a Postgres pool.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Raw row shape; `role` stays text until parsed at the boundary.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    external_id: Option<String>,
    email: String,
    role: String,
    profile: serde_json::Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            external_id: row.external_id,
            email: row.email,
            // Rows written before the role column existed (or holding a
            // value outside the closed set) read back as the default.
            role: Role::parse(&row.role).unwrap_or_default(),
            profile: row.profile,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, external_id, email, role, profile, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_all(&self.db)
        .await?;

        // Impossible while the unique index stands; fatal if it was dropped.
        if rows.len() > 1 {
            return Err(Error::DuplicateEmail(email.to_string()));
        }
        Ok(rows.into_iter().next().map(UserRecord::from))
    }

    async fn upsert_role(
        &self,
        email: &str,
        role: Role,
        external_id: Option<&str>,
    ) -> Result<UserRecord> {
        // One conditional statement: the conflict arm sets only role and
        // updated_at, so profile and external_id can never be clobbered,
        // and updated_at moves only when the role actually changes.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, external_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET role = EXCLUDED.role,
                updated_at = CASE
                    WHEN users.role IS DISTINCT FROM EXCLUDED.role THEN now()
                    ELSE users.updated_at
                END
            RETURNING id, external_id, email, role, profile, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(external_id)
        .bind(role.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    fn list_users(&self) -> BoxStream<'_, Result<UserRecord>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, external_id, email, role, profile, created_at, updated_at
            FROM users
            "#,
        )
        .fetch(&self.db)
        .map(|row| row.map(UserRecord::from).map_err(Error::from))
        .boxed()
    }
}
