//! Read-only account and stored-playlist directory.
//!
//! Stands in for the account-management side: a JSON snapshot loaded at
//! startup, never written back.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::models::{AccountRecord, StoredPlaylistDocument};
use crate::services::source::DocumentStore;

/// On-disk snapshot layout
#[derive(Debug, Default, Deserialize)]
struct DirectorySnapshot {
    #[serde(default)]
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    playlists: Vec<StoredPlaylistDocument>,
}

/// Why a protocol caller was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account disabled")]
    Disabled,
    #[error("Subscription expired")]
    Expired,
}

#[derive(Debug, Default)]
pub struct AccountDirectory {
    /// Keyed by username
    accounts: HashMap<String, Arc<AccountRecord>>,
    documents: HashMap<String, Arc<StoredPlaylistDocument>>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<AccountRecord>, documents: Vec<StoredPlaylistDocument>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|a| (a.username.clone(), Arc::new(a)))
                .collect(),
            documents: documents
                .into_iter()
                .map(|d| (d.id.clone(), Arc::new(d)))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: DirectorySnapshot =
            serde_json::from_str(json).context("Invalid account directory JSON")?;
        Ok(Self::new(snapshot.accounts, snapshot.playlists))
    }

    /// Load the snapshot file; a missing file yields an empty directory
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let directory = Self::from_json(&content)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                tracing::info!(
                    accounts = directory.accounts.len(),
                    playlists = directory.documents.len(),
                    "Account directory loaded from {}",
                    path.display()
                );
                Ok(directory)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Account file {} not found, starting empty", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn find_account(&self, username: &str) -> Option<Arc<AccountRecord>> {
        self.accounts.get(username).cloned()
    }

    /// Check credentials against the stored bcrypt hash, then the active
    /// flag, then expiry. A malformed hash never authenticates.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<AccountRecord>, AccessDenied> {
        let account = self
            .find_account(username)
            .filter(|a| bcrypt::verify(password, &a.password).unwrap_or(false))
            .ok_or(AccessDenied::InvalidCredentials)?;

        if !account.is_active {
            return Err(AccessDenied::Disabled);
        }
        if account.is_expired(now) {
            return Err(AccessDenied::Expired);
        }

        Ok(account)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl DocumentStore for AccountDirectory {
    fn find_document(&self, id: &str) -> Option<Arc<StoredPlaylistDocument>> {
        self.documents.get(id).cloned()
    }
}
