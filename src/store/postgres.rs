//! PostgreSQL-backed stores.
//!
//! Uniqueness is enforced by the unique indexes in `migrations/`; SQLSTATE
//! 23505 is surfaced as `StoreError::Conflict` so callers can resolve races
//! instead of seeing a raw database error.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{LocalCredential, Secret, SessionStore, SecretStore, StoreError, User, UserStore};
use crate::auth::strategy::Provider;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn map_write_error(err: sqlx::Error, what: &'static str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict
    } else {
        StoreError::Unavailable(anyhow::Error::new(err).context(what))
    }
}

fn map_read_error(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Unavailable(anyhow::Error::new(err).context(what))
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        google_id: row.get("google_id"),
        facebook_id: row.get("facebook_id"),
    }
}

/// Column holding the provider-scoped external id.
const fn provider_column(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "google_id",
        Provider::Facebook => "facebook_id",
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_local(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, google_id, facebook_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_error(err, "failed to insert local user"))?;

        Ok(row_to_user(&row))
    }

    async fn find_local(&self, username: &str) -> Result<Option<LocalCredential>, StoreError> {
        let query = r"
            SELECT id, username, password_hash, google_id, facebook_id
            FROM users
            WHERE username = $1
              AND password_hash IS NOT NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to lookup local credential"))?;

        Ok(row.map(|row| LocalCredential {
            user: row_to_user(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn insert_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, StoreError> {
        // Column names come from a fixed enum, never from input.
        let query = format!(
            r"
            INSERT INTO users (id, {column})
            VALUES ($1, $2)
            RETURNING id, username, google_id, facebook_id
            ",
            column = provider_column(provider)
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(external_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_error(err, "failed to insert external user"))?;

        Ok(row_to_user(&row))
    }

    async fn find_external(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            r"
            SELECT id, username, google_id, facebook_id
            FROM users
            WHERE {column} = $1
            ",
            column = provider_column(provider)
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to lookup external identity"))?;

        Ok(row.map(|row| row_to_user(&row)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = r"
            SELECT id, username, google_id, facebook_id
            FROM users
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to lookup user by id"))?;

        Ok(row.map(|row| row_to_user(&row)))
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_error(err, "failed to insert session"))?;
        Ok(())
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        let query = r"
            SELECT user_id
            FROM sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to lookup session"))?;

        Ok(row.map(|row| row.get("user_id")))
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to delete session"))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn insert(&self, user_id: Uuid, body: &str) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO secrets (id, user_id, body)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(body)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_write_error(err, "failed to insert secret"))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Secret>, StoreError> {
        let query = r"
            SELECT user_id, body
            FROM secrets
            ORDER BY created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| map_read_error(err, "failed to list secrets"))?;

        Ok(rows
            .iter()
            .map(|row| Secret {
                user_id: row.get("user_id"),
                body: row.get("body"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn write_errors_split_conflict_from_unavailable() {
        let conflict = map_write_error(
            sqlx::Error::Database(Box::new(TestDbError {
                code: Some("23505"),
            })),
            "insert",
        );
        assert!(matches!(conflict, StoreError::Conflict));

        let unavailable = map_write_error(sqlx::Error::PoolTimedOut, "insert");
        assert!(matches!(unavailable, StoreError::Unavailable(_)));
    }

    #[test]
    fn provider_columns_are_fixed() {
        assert_eq!(provider_column(Provider::Google), "google_id");
        assert_eq!(provider_column(Provider::Facebook), "facebook_id");
    }
}
