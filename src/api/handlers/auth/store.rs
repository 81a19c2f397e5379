//! Credential store contract and the in-memory implementation.
//!
//! The store holds one document per account and exposes an optimistic
//! compare-and-update keyed on the document version. The policy engine
//! loads a snapshot, mutates it, and writes it back in one call; a version
//! conflict means another request won the race and the caller reloads.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::account::Account;

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// An account with the same normalized email already exists.
    Conflict,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The stored version moved on; the caller must reload and retry.
    Conflict,
    Missing,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, account: &Account) -> Result<InsertOutcome>;

    /// Lookup by normalized (trimmed, lowercased) email.
    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Lookup by the sha256 of a password reset token.
    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>>;

    /// Write the document iff the stored version still matches
    /// `account.version`; the stored version is bumped on success.
    async fn compare_and_update(&self, account: &Account) -> Result<UpdateOutcome>;

    /// Backend liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// In-memory store used by tests and DSN-less local development.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, account: &Account) -> Result<InsertOutcome> {
        let mut accounts = self.accounts.lock().await;
        let taken = accounts
            .values()
            .any(|existing| existing.email_normalized == account.email_normalized);
        if taken || accounts.contains_key(&account.id) {
            return Ok(InsertOutcome::Conflict);
        }
        accounts.insert(account.id, account.clone());
        Ok(InsertOutcome::Created)
    }

    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|account| account.email_normalized == email_normalized)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|account| account.password_reset.token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn compare_and_update(&self, account: &Account) -> Result<UpdateOutcome> {
        let mut accounts = self.accounts.lock().await;
        let Some(stored) = accounts.get_mut(&account.id) else {
            return Ok(UpdateOutcome::Missing);
        };
        if stored.version != account.version {
            return Ok(UpdateOutcome::Conflict);
        }
        let mut updated = account.clone();
        updated.version += 1;
        *stored = updated;
        Ok(UpdateOutcome::Updated)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
