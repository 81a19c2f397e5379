//! Postgres-backed credential store.
//!
//! Each account is one JSONB document plus the columns the store needs for
//! lookups and the version guard. Compare-and-update is a single
//! conditional `UPDATE … WHERE version = $n RETURNING`, so two concurrent
//! writers against the same document cannot both win.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgPoolOptions, types::Json};
use std::time::Duration;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::account::Account;
use super::store::{CredentialStore, InsertOutcome, UpdateOutcome};

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Connect a pool against the document store DSN.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be established.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("failed to connect to the credential store")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> Result<Account> {
        let Json(mut account): Json<Account> = row.try_get("doc").context("malformed account document")?;
        // The column is authoritative for the version guard.
        account.version = row.try_get("version").context("missing account version")?;
        Ok(account)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, account: &Account) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO accounts (id, email_normalized, reset_token_hash, doc, version)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.email_normalized)
            .bind(account.password_reset.token_hash.as_deref())
            .bind(Json(account))
            .bind(account.version)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Account>> {
        let query = "SELECT doc, version FROM accounts WHERE email_normalized = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email_normalized)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by email")?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = "SELECT doc, version FROM accounts WHERE id = $1";
        let span = info_span!(
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
            .context("failed to lookup account by id")?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>> {
        let query = "SELECT doc, version FROM accounts WHERE reset_token_hash = $1";
        let span = info_span!(
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
            .context("failed to lookup account by reset token")?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn compare_and_update(&self, account: &Account) -> Result<UpdateOutcome> {
        let query = r"
            UPDATE accounts
            SET doc = $3,
                email_normalized = $4,
                reset_token_hash = $5,
                version = accounts.version + 1
            WHERE id = $1
              AND version = $2
            RETURNING version
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account.id)
            .bind(account.version)
            .bind(Json(account))
            .bind(&account.email_normalized)
            .bind(account.password_reset.token_hash.as_deref())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update account")?;

        if row.is_some() {
            return Ok(UpdateOutcome::Updated);
        }

        // Distinguish a lost race from a deleted document.
        let query = "SELECT 1 FROM accounts WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let exists = sqlx::query(query)
            .bind(account.id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check account existence")?;

        Ok(if exists.is_some() {
            UpdateOutcome::Conflict
        } else {
            UpdateOutcome::Missing
        })
    }

    async fn ping(&self) -> Result<()> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")?;
        conn.ping()
            .instrument(span)
            .await
            .context("failed to ping the credential store")
    }
}
