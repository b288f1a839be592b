pub mod accounts;
pub mod catalog_cache;
pub mod m3u_parser;
pub mod query;
pub mod source;
