mod account;
mod catalog;

pub use account::{AccountRecord, StoredPlaylistDocument};
pub use catalog::{hash_url, CacheKey, CatalogEntry, Category, ParsedCatalog, StreamKind};
