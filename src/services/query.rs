//! Category and entry queries over the catalog cache.
//!
//! Load failures never reach the caller: they are answered from a small
//! fixed placeholder catalog instead, since legacy clients cannot tell an
//! empty catalog from a broken session.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::models::{AccountRecord, CatalogEntry, Category, ParsedCatalog, StreamKind};
use crate::services::catalog_cache::CatalogCache;

/// Fallback catalog with categories carrying display names
struct Placeholder {
    live_categories: Vec<Category>,
    movie_categories: Vec<Category>,
    series_categories: Vec<Category>,
    catalog: ParsedCatalog,
}

fn category(id: &str, name: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn sample(kind: StreamKind, stream_id: u64, name: &str, category_id: &str, source_url: &str) -> CatalogEntry {
    CatalogEntry {
        num: stream_id,
        name: name.to_string(),
        kind,
        stream_id,
        icon: String::new(),
        epg_channel_id: String::new(),
        category_id: category_id.to_string(),
        source_url: source_url.to_string(),
    }
}

lazy_static! {
    static ref PLACEHOLDER: Placeholder = Placeholder {
        live_categories: vec![
            category("1", "General"),
            category("2", "News"),
            category("3", "Sports"),
            category("4", "Entertainment"),
            category("5", "Movies"),
        ],
        movie_categories: vec![
            category("10", "Action"),
            category("11", "Comedy"),
            category("12", "Drama"),
            category("13", "Horror"),
        ],
        series_categories: vec![
            category("20", "Drama Series"),
            category("21", "Comedy Series"),
            category("22", "Action Series"),
        ],
        catalog: ParsedCatalog {
            categories: Vec::new(),
            live: vec![
                sample(StreamKind::Live, 1, "Channel 1", "1", "http://sample-stream.com/live/1.m3u8"),
                sample(StreamKind::Live, 2, "Channel 2", "1", "http://sample-stream.com/live/2.m3u8"),
                sample(StreamKind::Live, 3, "News Live", "2", "http://sample-stream.com/live/news.m3u8"),
                sample(StreamKind::Live, 4, "Sports Channel", "3", "http://sample-stream.com/live/sports.m3u8"),
            ],
            movies: vec![
                sample(StreamKind::Movie, 101, "Sample Movie 1", "10", "http://sample-stream.com/movie/1.mp4"),
                sample(StreamKind::Movie, 102, "Sample Movie 2", "11", "http://sample-stream.com/movie/2.mp4"),
            ],
            series: vec![
                sample(StreamKind::Series, 201, "Sample Series 1", "20", "http://sample-stream.com/series/201.mp4"),
                sample(StreamKind::Series, 202, "Sample Series 2", "21", "http://sample-stream.com/series/202.mp4"),
            ],
        },
    };
}

fn placeholder_categories(kind: StreamKind) -> Vec<Category> {
    match kind {
        StreamKind::Live => PLACEHOLDER.live_categories.clone(),
        StreamKind::Movie => PLACEHOLDER.movie_categories.clone(),
        StreamKind::Series => PLACEHOLDER.series_categories.clone(),
    }
}

/// Distinct category ids among entries, in first-seen order
fn categories_of(entries: &[CatalogEntry]) -> Vec<Category> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.category_id.as_str()))
        .map(|e| Category::from_id(&e.category_id))
        .collect()
}

fn filter_entries(entries: &[CatalogEntry], category_id: Option<&str>) -> Vec<CatalogEntry> {
    match category_id {
        Some(id) => entries.iter().filter(|e| e.category_id == id).cloned().collect(),
        None => entries.to_vec(),
    }
}

/// Query front for the protocol routes
pub struct QueryService {
    cache: CatalogCache,
}

impl QueryService {
    pub fn new(cache: CatalogCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Categories that actually hold entries of `kind`
    pub async fn categories(&self, account: &AccountRecord, kind: StreamKind) -> Vec<Category> {
        match self.cache.get_or_load(account).await {
            Ok(catalog) => categories_of(catalog.entries(kind)),
            Err(e) => {
                tracing::warn!(account = %account.username, kind = %kind, error = %e, "serving placeholder categories");
                placeholder_categories(kind)
            }
        }
    }

    /// Entries of `kind`, optionally restricted to one category id (exact match)
    pub async fn entries(
        &self,
        account: &AccountRecord,
        kind: StreamKind,
        category_id: Option<&str>,
    ) -> Vec<CatalogEntry> {
        match self.cache.get_or_load(account).await {
            Ok(catalog) => filter_entries(catalog.entries(kind), category_id),
            Err(e) => {
                tracing::warn!(account = %account.username, kind = %kind, error = %e, "serving placeholder entries");
                filter_entries(PLACEHOLDER.catalog.entries(kind), category_id)
            }
        }
    }

    /// Entry lookup for playback and detail requests. Real catalog only.
    pub async fn find_entry(
        &self,
        account: &AccountRecord,
        kind: StreamKind,
        stream_id: u64,
    ) -> Option<CatalogEntry> {
        match self.cache.get_or_load(account).await {
            Ok(catalog) => catalog.find(kind, stream_id).cloned(),
            Err(e) => {
                tracing::warn!(account = %account.username, stream_id, error = %e, "entry lookup without catalog");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::m3u_parser::M3UParser;
    use crate::services::source::{FetchError, PlaylistSource};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    const PLAYLIST: &str = "#EXTM3U
#EXTINF:-1 tvg-id=\"cnn\" group-title=\"News\",CNN
http://x/cnn.ts
#EXTINF:-1 group-title=\"Sports\",ESPN
http://x/espn.ts
#EXTINF:-1 group-title=\"News\",BBC
http://x/bbc.ts
#EXTINF:-1 group-title=\"Movies\",Film A
http://x/a.mp4
#EXTINF:-1 group-title=\"Series\",Show S01E01
http://x/show.mp4
";

    struct Fixed(Result<String, FetchError>);

    #[async_trait]
    impl PlaylistSource for Fixed {
        async fn resolve(&self, _account: &AccountRecord) -> Result<String, FetchError> {
            self.0.clone()
        }
    }

    fn service(result: Result<String, FetchError>) -> QueryService {
        let cache = CatalogCache::new(Arc::new(Fixed(result)), M3UParser::default(), Duration::from_secs(60));
        QueryService::new(cache)
    }

    fn account() -> AccountRecord {
        AccountRecord {
            id: "1".to_string(),
            username: "alice".to_string(),
            password: "secret".to_string(),
            playlist_id: Some("pl".to_string()),
            playlist_url: None,
            is_active: true,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            max_connections: 1,
        }
    }

    fn ids(categories: &[Category]) -> Vec<&str> {
        categories.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_categories_are_per_kind() {
        let service = service(Ok(PLAYLIST.to_string()));
        let acc = account();

        assert_eq!(ids(&service.categories(&acc, StreamKind::Live).await), vec!["News", "Sports"]);
        assert_eq!(ids(&service.categories(&acc, StreamKind::Movie).await), vec!["Movies"]);
        assert_eq!(ids(&service.categories(&acc, StreamKind::Series).await), vec!["Series"]);

        let live = service.categories(&acc, StreamKind::Live).await;
        assert_eq!(live[0].name, "News");
    }

    #[tokio::test]
    async fn test_entries_with_and_without_filter() {
        let service = service(Ok(PLAYLIST.to_string()));
        let acc = account();

        let all = service.entries(&acc, StreamKind::Live, None).await;
        assert_eq!(all.len(), 3);

        let news = service.entries(&acc, StreamKind::Live, Some("News")).await;
        let names: Vec<&str> = news.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["CNN", "BBC"]);

        // Exact match only
        assert!(service.entries(&acc, StreamKind::Live, Some("news")).await.is_empty());
        assert!(service.entries(&acc, StreamKind::Live, Some("Movies")).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_kind_is_not_replaced() {
        let service = service(Ok("#EXTINF:-1 group-title=\"News\",CNN\nhttp://x/cnn.ts\n".to_string()));
        let acc = account();

        assert!(service.categories(&acc, StreamKind::Movie).await.is_empty());
        assert!(service.entries(&acc, StreamKind::Movie, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_on_failure() {
        let service = service(Err(FetchError::FetchFailed("timeout".to_string())));
        let acc = account();

        let live = service.categories(&acc, StreamKind::Live).await;
        assert_eq!(live.len(), 5);
        assert_eq!(live[0], category("1", "General"));

        assert_eq!(service.entries(&acc, StreamKind::Live, None).await.len(), 4);
        assert_eq!(service.entries(&acc, StreamKind::Live, Some("1")).await.len(), 2);
        assert_eq!(ids(&service.categories(&acc, StreamKind::Movie).await), vec!["10", "11", "12", "13"]);
        assert_eq!(service.entries(&acc, StreamKind::Series, Some("21")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_on_no_source() {
        let service = service(Err(FetchError::NoSource));
        let entries = service.entries(&account(), StreamKind::Movie, None).await;
        assert_eq!(entries[0].name, "Sample Movie 1");
    }

    #[tokio::test]
    async fn test_find_entry() {
        let service = service(Ok(PLAYLIST.to_string()));
        let acc = account();

        let film = service.find_entry(&acc, StreamKind::Movie, 4).await.unwrap();
        assert_eq!(film.source_url, "http://x/a.mp4");
        // Stream ids are looked up within the requested kind only
        assert!(service.find_entry(&acc, StreamKind::Live, 4).await.is_none());

        let failing = self::service(Err(FetchError::NoSource));
        assert!(failing.find_entry(&acc, StreamKind::Live, 1).await.is_none());
    }
}
