use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::time::Instant;

use crate::config::CatalogLimits;
use crate::models::{CatalogEntry, ParsedCatalog, StreamKind};

const EXTINF_PREFIX: &str = "#EXTINF:";

// Lines longer than this are skipped as malformed. Well above tokenized CDN URLs.
const MAX_LINE_BYTES: usize = 1024 * 1024;

const DEFAULT_CATEGORY: &str = "Uncategorized";

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"([A-Za-z][\w-]*)="([^"]*)""#).unwrap();
}

/// Parsed EXTINF line data. Only whitelisted attributes are kept.
#[derive(Debug, Default, PartialEq)]
struct ExtinfData {
    title: Option<String>,
    group_title: Option<String>,
    tvg_logo: Option<String>,
    tvg_id: Option<String>,
}

impl ExtinfData {
    fn into_entry(self, stream_id: u64) -> CatalogEntry {
        CatalogEntry {
            num: stream_id,
            name: self
                .title
                .unwrap_or_else(|| format!("Channel {}", stream_id)),
            kind: StreamKind::Live,
            stream_id,
            icon: self.tvg_logo.unwrap_or_default(),
            epg_channel_id: self.tvg_id.unwrap_or_default(),
            category_id: self
                .group_title
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            source_url: String::new(),
        }
    }
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-logo="..." group-title="...",Title
///
/// The title is the text after the last comma. Attribute names match
/// case-insensitively; empty values count as absent.
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix(EXTINF_PREFIX)?;

    let (header, title) = match content.rsplit_once(',') {
        Some((header, title)) => (header, Some(title.trim())),
        None => (content, None),
    };

    let mut data = ExtinfData {
        title: title.filter(|t| !t.is_empty()).map(str::to_string),
        ..Default::default()
    };

    for caps in ATTR_REGEX.captures_iter(header) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if value.as_str().is_empty() {
            continue;
        }

        let slot = match key.as_str().to_ascii_lowercase().as_str() {
            "group-title" => &mut data.group_title,
            "tvg-logo" => &mut data.tvg_logo,
            "tvg-id" => &mut data.tvg_id,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.as_str().to_string());
        }
    }

    Some(data)
}

/// Accumulates completed entries into the three bounded collections
struct CatalogBuilder {
    limits: CatalogLimits,
    seen_categories: HashSet<String>,
    catalog: ParsedCatalog,
    truncated: usize,
}

impl CatalogBuilder {
    fn new(limits: CatalogLimits) -> Self {
        Self {
            limits,
            seen_categories: HashSet::new(),
            catalog: ParsedCatalog::default(),
            truncated: 0,
        }
    }

    /// True once every collection has hit its ceiling
    fn is_saturated(&self) -> bool {
        self.catalog.live.len() >= self.limits.max_live
            && self.catalog.movies.len() >= self.limits.max_movie
            && self.catalog.series.len() >= self.limits.max_series
    }

    fn push(&mut self, mut entry: CatalogEntry) {
        if self.seen_categories.insert(entry.category_id.clone()) {
            self.catalog.categories.push(entry.category_id.clone());
        }

        let kind = StreamKind::from_category(&entry.category_id);
        let (bucket, ceiling) = match kind {
            StreamKind::Live => (&mut self.catalog.live, self.limits.max_live),
            StreamKind::Movie => (&mut self.catalog.movies, self.limits.max_movie),
            StreamKind::Series => (&mut self.catalog.series, self.limits.max_series),
        };

        if bucket.len() >= ceiling {
            self.truncated += 1;
            return;
        }

        entry.kind = kind;
        if kind != StreamKind::Live {
            entry.epg_channel_id.clear();
        }
        bucket.push(entry);
    }
}

/// Bounded, line-streaming M3U parser
#[derive(Debug, Clone, Copy, Default)]
pub struct M3UParser {
    limits: CatalogLimits,
}

impl M3UParser {
    pub fn new(limits: CatalogLimits) -> Self {
        Self { limits }
    }

    /// Parse playlist text into a bounded catalog.
    ///
    /// Never fails: unrecognized lines are skipped. Scanning walks the text
    /// line by line without collecting a line list, and stops once all three
    /// collections are full. A collection that is full drops further entries
    /// of its kind while the others keep filling.
    pub fn parse(&self, text: &str) -> ParsedCatalog {
        let started = Instant::now();
        let mut builder = CatalogBuilder::new(self.limits);
        let mut pending: Option<CatalogEntry> = None;
        let mut next_stream_id = 1u64;
        let mut long_lines = 0usize;
        let mut stopped_early = false;

        for raw in text.lines() {
            if builder.is_saturated() {
                stopped_early = true;
                break;
            }

            if raw.len() > MAX_LINE_BYTES {
                long_lines += 1;
                continue;
            }

            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(EXTINF_PREFIX) {
                if let Some(extinf) = parse_extinf(line) {
                    // A metadata line without its URL is replaced, not emitted
                    pending = Some(extinf.into_entry(next_stream_id));
                    next_stream_id += 1;
                }
                continue;
            }

            // #EXTM3U, #EXTGRP, #EXTVLCOPT, ...
            if line.starts_with('#') {
                continue;
            }

            if let Some(mut entry) = pending.take() {
                entry.source_url = line.to_string();
                builder.push(entry);
            }
        }

        if long_lines > 0 {
            tracing::warn!(long_lines, max_line_bytes = MAX_LINE_BYTES, "skipped oversized playlist lines");
        }

        let truncated = builder.truncated;
        let catalog = builder.catalog;

        tracing::info!(
            categories = catalog.categories.len(),
            live = catalog.live.len(),
            movies = catalog.movies.len(),
            series = catalog.series.len(),
            truncated,
            stopped_early,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "playlist parsed"
        );

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_live: usize, max_movie: usize, max_series: usize) -> CatalogLimits {
        CatalogLimits { max_live, max_movie, max_series }
    }

    fn extinf(group: &str, name: &str) -> String {
        format!("#EXTINF:-1 group-title=\"{}\",{}\n", group, name)
    }

    #[test]
    fn test_parse_extinf() {
        let line = r#"#EXTINF:-1 tvg-id="globo" tvg-name="Globo HD" tvg-logo="http://logo.com/globo.png" group-title="TV",Globo HD"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title.as_deref(), Some("Globo HD"));
        assert_eq!(extinf.tvg_id.as_deref(), Some("globo"));
        assert_eq!(extinf.tvg_logo.as_deref(), Some("http://logo.com/globo.png"));
        assert_eq!(extinf.group_title.as_deref(), Some("TV"));
    }

    #[test]
    fn test_parse_extinf_minimal() {
        let extinf = parse_extinf("#EXTINF:-1,Canal Teste").unwrap();

        assert_eq!(extinf.title.as_deref(), Some("Canal Teste"));
        assert_eq!(extinf.group_title, None);
        assert_eq!(extinf.tvg_logo, None);
    }

    #[test]
    fn test_parse_extinf_title_after_last_comma() {
        let extinf = parse_extinf(r#"#EXTINF:-1 group-title="A, B",Show, Part 2"#).unwrap();
        assert_eq!(extinf.title.as_deref(), Some("Part 2"));
        assert_eq!(extinf.group_title.as_deref(), Some("A, B"));
    }

    #[test]
    fn test_parse_extinf_ignores_unknown_and_empty_attributes() {
        let extinf =
            parse_extinf(r#"#EXTINF:-1 GROUP-TITLE="Sports" tvg-logo="" x-custom="1",Name"#).unwrap();
        assert_eq!(extinf.group_title.as_deref(), Some("Sports"));
        assert_eq!(extinf.tvg_logo, None);
        assert_eq!(extinf.tvg_id, None);
    }

    #[test]
    fn test_parse_example_playlist() {
        let text = "#EXTINF:-1 group-title=\"News\",CNN\nhttp://x/cnn.ts\n#EXTINF:-1 group-title=\"Movies\",Film A\nhttp://x/a.mp4\n";
        let catalog = M3UParser::default().parse(text);

        assert_eq!(catalog.categories, vec!["News", "Movies"]);
        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.movies.len(), 1);
        assert!(catalog.series.is_empty());

        let cnn = &catalog.live[0];
        assert_eq!(cnn.name, "CNN");
        assert_eq!(cnn.category_id, "News");
        assert_eq!(cnn.stream_id, 1);
        assert_eq!(cnn.kind, StreamKind::Live);
        assert_eq!(cnn.source_url, "http://x/cnn.ts");

        let film = &catalog.movies[0];
        assert_eq!(film.name, "Film A");
        assert_eq!(film.category_id, "Movies");
        assert_eq!(film.stream_id, 2);
        assert_eq!(film.kind, StreamKind::Movie);
    }

    #[test]
    fn test_dangling_metadata_is_dropped() {
        let text = format!("{}http://x/1.ts\n{}", extinf("News", "One"), extinf("News", "Two"));
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.live[0].name, "One");
    }

    #[test]
    fn test_metadata_replaced_by_next_metadata() {
        let text = format!("{}{}http://x/2.ts\n", extinf("News", "One"), extinf("News", "Two"));
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.live[0].name, "Two");
        // The orphaned metadata line still consumed id 1
        assert_eq!(catalog.live[0].stream_id, 2);
    }

    #[test]
    fn test_defaults_and_comments() {
        let text = "#EXTM3U\r\n#EXTINF:-1\r\n\r\n#EXTVLCOPT:http-user-agent=VLC\r\nhttp://x/1.ts\r\nhttp://x/stray.ts\r\n";
        let catalog = M3UParser::default().parse(text);

        assert_eq!(catalog.live.len(), 1);
        let entry = &catalog.live[0];
        assert_eq!(entry.name, "Channel 1");
        assert_eq!(entry.category_id, "Uncategorized");
        assert_eq!(entry.source_url, "http://x/1.ts");
        assert_eq!(catalog.categories, vec!["Uncategorized"]);
    }

    #[test]
    fn test_epg_id_kept_only_for_live() {
        let text = "#EXTINF:-1 tvg-id=\"cnn.us\" group-title=\"News\",CNN\nhttp://x/cnn.ts\n#EXTINF:-1 tvg-id=\"film\" group-title=\"VOD\",Film\nhttp://x/f.mp4\n";
        let catalog = M3UParser::default().parse(text);

        assert_eq!(catalog.live[0].epg_channel_id, "cnn.us");
        assert_eq!(catalog.movies[0].epg_channel_id, "");
    }

    #[test]
    fn test_partition_by_category_name() {
        let mut text = String::new();
        for (i, group) in ["News", "Movies 4K", "Series HD", "vod: drama", "Sports", "my MOVIE night"]
            .iter()
            .enumerate()
        {
            text.push_str(&extinf(group, &format!("E{}", i)));
            text.push_str(&format!("http://x/{}.ts\n", i));
        }
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 2);
        assert_eq!(catalog.movies.len(), 3);
        assert_eq!(catalog.series.len(), 1);
        assert_eq!(catalog.total_entries(), 6);
        assert!(catalog.movies.iter().all(|e| e.kind == StreamKind::Movie));
        assert!(catalog
            .live
            .iter()
            .chain(catalog.series.iter())
            .all(|e| !e.category_id.to_lowercase().contains("movie")));

        let mut ids: Vec<u64> = catalog
            .live
            .iter()
            .chain(&catalog.movies)
            .chain(&catalog.series)
            .map(|e| e.stream_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_ceiling_keeps_collecting_other_kinds() {
        let mut text = String::new();
        for i in 0..5 {
            text.push_str(&extinf("News", &format!("Live {}", i)));
            text.push_str(&format!("http://x/l{}.ts\n", i));
        }
        text.push_str(&extinf("Movies", "Film"));
        text.push_str("http://x/film.mp4\n");
        text.push_str(&extinf("Sports", "Late Live"));
        text.push_str("http://x/late.ts\n");

        let catalog = M3UParser::new(limits(2, 10, 10)).parse(&text);

        assert_eq!(catalog.live.len(), 2);
        assert_eq!(catalog.live[1].name, "Live 1");
        assert_eq!(catalog.movies.len(), 1);
        assert_eq!(catalog.movies[0].stream_id, 6);
        // Truncated entries still register their category while scanning continues
        assert_eq!(catalog.categories, vec!["News", "Movies", "Sports"]);
    }

    #[test]
    fn test_stops_once_all_ceilings_reached() {
        let mut text = String::new();
        text.push_str(&extinf("News", "CNN"));
        text.push_str("http://x/cnn.ts\n");
        text.push_str(&extinf("Movies", "Film"));
        text.push_str("http://x/film.mp4\n");
        text.push_str(&extinf("Series", "Show S01E01"));
        text.push_str("http://x/show.mp4\n");
        text.push_str(&extinf("Sports", "ESPN"));
        text.push_str("http://x/espn.ts\n");

        let catalog = M3UParser::new(limits(1, 1, 1)).parse(&text);

        assert_eq!(catalog.total_entries(), 3);
        assert_eq!(catalog.categories, vec!["News", "Movies", "Series"]);
    }

    #[test]
    fn test_ceilings_hold_for_large_input() {
        let mut text = String::from("#EXTM3U\n");
        for i in 0..3000 {
            let group = match i % 3 {
                0 => "Live",
                1 => "Movies",
                _ => "Series",
            };
            text.push_str(&extinf(group, &format!("Item {}", i)));
            text.push_str(&format!("http://x/{}.ts\n", i));
        }

        let catalog = M3UParser::new(limits(100, 50, 25)).parse(&text);
        assert_eq!(catalog.live.len(), 100);
        assert_eq!(catalog.movies.len(), 50);
        assert_eq!(catalog.series.len(), 25);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let mut text = String::new();
        for i in 0..50 {
            let group = if i % 4 == 0 { "Movies" } else { "News" };
            text.push_str(&extinf(group, &format!("Item {}", i)));
            text.push_str(&format!("http://x/{}.ts\n", i));
        }
        let parser = M3UParser::new(limits(20, 5, 5));
        assert_eq!(parser.parse(&text), parser.parse(&text));
    }

    #[test]
    fn test_oversized_lines_are_skipped() {
        let huge = format!("#EXTINF:-1,{}\n", "x".repeat(MAX_LINE_BYTES + 1));
        let text = format!("{}{}http://x/1.ts\n", extinf("News", "Ok"), huge);
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.live[0].name, "Ok");
    }

    #[test]
    fn test_long_tokenized_url_is_kept() {
        let url = format!("http://cdn.x/live/1.m3u8?token={}", "a".repeat(64 * 1024));
        let text = format!("{}{}\n", extinf("News", "Tokenized"), url);
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.live[0].source_url, url);
    }

    #[test]
    fn test_skipped_metadata_line_takes_no_stream_id() {
        let huge = format!("#EXTINF:-1,{}\n", "x".repeat(MAX_LINE_BYTES + 1));
        let text = format!("{}http://x/0.ts\n{}", huge, extinf("News", "First"));
        let text = format!("{}http://x/1.ts\n", text);
        let catalog = M3UParser::default().parse(&text);

        assert_eq!(catalog.live.len(), 1);
        assert_eq!(catalog.live[0].name, "First");
        assert_eq!(catalog.live[0].stream_id, 1);
    }

    #[test]
    fn test_garbage_input_yields_empty_catalog() {
        let catalog = M3UParser::default().parse("not a playlist\n\u{0}\u{1}\n#EXTINF\n");
        assert_eq!(catalog, ParsedCatalog::default());
    }
}
