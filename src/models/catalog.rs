use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::AccountRecord;

/// Stream kind a catalog entry is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Live,
    Movie,
    Series,
}

impl StreamKind {
    /// Classify by category name: "movie"/"vod" first, then "series", else live
    pub fn from_category(category: &str) -> Self {
        let lower = category.to_lowercase();
        if lower.contains("movie") || lower.contains("vod") {
            StreamKind::Movie
        } else if lower.contains("series") {
            StreamKind::Series
        } else {
            StreamKind::Live
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Live => write!(f, "live"),
            StreamKind::Movie => write!(f, "movie"),
            StreamKind::Series => write!(f, "series"),
        }
    }
}

/// Single playable entry (channel/movie/episode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub num: u64,
    pub name: String,
    pub kind: StreamKind,
    /// 1-based, unique within one parse only
    pub stream_id: u64,
    pub icon: String,
    /// Only meaningful for live entries
    pub epg_channel_id: String,
    pub category_id: String,
    pub source_url: String,
}

/// Category as exposed to protocol callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    /// Playlist categories use the raw group title as both id and name
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
        }
    }
}

/// Result of one playlist parse. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCatalog {
    /// Distinct category ids in first-seen order
    pub categories: Vec<String>,
    pub live: Vec<CatalogEntry>,
    pub movies: Vec<CatalogEntry>,
    pub series: Vec<CatalogEntry>,
}

impl ParsedCatalog {
    pub fn entries(&self, kind: StreamKind) -> &[CatalogEntry] {
        match kind {
            StreamKind::Live => &self.live,
            StreamKind::Movie => &self.movies,
            StreamKind::Series => &self.series,
        }
    }

    /// Look up an entry of the given kind by its stream id
    pub fn find(&self, kind: StreamKind, stream_id: u64) -> Option<&CatalogEntry> {
        self.entries(kind).iter().find(|e| e.stream_id == stream_id)
    }

    pub fn total_entries(&self) -> usize {
        self.live.len() + self.movies.len() + self.series.len()
    }
}

/// Identity under which a parsed catalog is cached.
///
/// Derived from the stored playlist id, else the direct playlist URL (hashed),
/// else the account id. Accounts sharing a stored playlist share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_account(account: &AccountRecord) -> Self {
        if let Some(ref playlist_id) = account.playlist_id {
            return Self(format!("playlist:{}", playlist_id));
        }
        if let Some(ref url) = account.playlist_url {
            return Self(format!("url:{}", hash_url(url)));
        }
        Self(format!("account:{}", account.id))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA1 hex digest of a URL, used so credential-bearing URLs never appear in keys or logs
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(playlist_id: Option<&str>, url: Option<&str>) -> AccountRecord {
        AccountRecord {
            id: "acc-1".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            playlist_id: playlist_id.map(str::to_string),
            playlist_url: url.map(str::to_string),
            is_active: true,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            max_connections: 1,
        }
    }

    #[test]
    fn test_hash_url() {
        let hash = hash_url("http://example.com/playlist.m3u");
        assert_eq!(hash.len(), 40); // SHA1 produces 40 hex chars
        assert_eq!(hash, hash_url("http://example.com/playlist.m3u"));
    }

    #[test]
    fn test_cache_key_priority() {
        let both = CacheKey::for_account(&account(Some("pl-9"), Some("http://x/a.m3u")));
        assert_eq!(both.to_string(), "playlist:pl-9");

        let url_only = CacheKey::for_account(&account(None, Some("http://x/a.m3u")));
        assert_eq!(url_only.to_string(), format!("url:{}", hash_url("http://x/a.m3u")));

        let neither = CacheKey::for_account(&account(None, None));
        assert_eq!(neither.to_string(), "account:acc-1");
    }

    #[test]
    fn test_shared_playlist_shares_key() {
        let mut other = account(Some("pl-9"), None);
        other.id = "acc-2".to_string();
        assert_eq!(
            CacheKey::for_account(&account(Some("pl-9"), None)),
            CacheKey::for_account(&other)
        );
    }

    #[test]
    fn test_kind_from_category() {
        assert_eq!(StreamKind::from_category("Movies"), StreamKind::Movie);
        assert_eq!(StreamKind::from_category("VOD | Action"), StreamKind::Movie);
        assert_eq!(StreamKind::from_category("TV SERIES"), StreamKind::Series);
        assert_eq!(StreamKind::from_category("Movie Series"), StreamKind::Movie);
        assert_eq!(StreamKind::from_category("News"), StreamKind::Live);
    }
}
