use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscriber account as owned by the account-management side.
/// Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub username: String,
    /// bcrypt hash
    pub password: String,
    /// Assigned stored playlist document
    #[serde(default)]
    pub playlist_id: Option<String>,
    /// Account's own remote playlist URL
    #[serde(default)]
    pub playlist_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl AccountRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Uploaded or linked playlist document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlaylistDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    1
}
