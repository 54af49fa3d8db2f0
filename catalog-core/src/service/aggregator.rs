//! Read-path list aggregation (§4.J).
//!
//! Most list reads are served straight from `VideoRepository`/`SearchRepository`
//! against the merged catalog; the Aggregator exists for the handful of queries that
//! still need a live multi-source fan-out (e.g. "what's currently on source X right
//! now" probes used by the admin health view). Results are cache-first, deduped by
//! `(name, year, area)`, and coalesced via `SingleFlight` so a cache-stampede from N
//! concurrent identical requests only fans out once.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheManager;
use crate::models::{Source, Video};
use crate::repository::{ListFilters, ListSortOrder, VideoRepository};
use crate::Result;

/// Coalesces concurrent identical probes so a cache-stampede of N simultaneous
/// requests for the same `(sources, category)` fan-out issues the upstream calls once.
type ProbeSingleFlight = crate::cache::SingleFlight<String, Vec<String>, String>;

/// Filter/sort facets for a list-browsing request (§4.J).
#[derive(Debug, Clone, Default)]
pub struct AggregateFilters {
    pub type_id: Option<i16>,
    pub sub_type_id: Option<i32>,
    pub tag: Option<String>,
    pub area: Option<String>,
    pub year: Option<String>,
    pub sort: Option<ListSortOrder>,
    pub page: i64,
    pub page_size: i64,
}

/// Options controlling whether a cache miss is allowed to fan out to upstreams, and
/// whether welfare sources participate in that fan-out (§4.J).
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub cache_only: bool,
    pub include_welfare: bool,
}

pub struct Aggregator {
    videos: Arc<VideoRepository>,
    cache: Arc<CacheManager>,
    singleflight: ProbeSingleFlight,
    /// System-wide welfare switch (`CollectionConfig::welfare_enabled`); a welfare
    /// source only joins a fan-out when this **and** the caller's `include_welfare`
    /// are both set.
    welfare_enabled: bool,
}

impl Aggregator {
    #[must_use]
    pub fn new(videos: Arc<VideoRepository>, cache: Arc<CacheManager>, welfare_enabled: bool) -> Self {
        Self {
            videos,
            cache,
            singleflight: ProbeSingleFlight::new(),
            welfare_enabled,
        }
    }

    /// Cache-first paginated list by type, falling back to the catalog store and
    /// repopulating the cache on miss.
    pub async fn list_by_type(&self, type_id: i16, page: i64, page_size: i64) -> Result<(Vec<Video>, i64)> {
        let cache_key = format!("list:{type_id}:{page}:{page_size}");
        if let Some(cached) = self.cache.get_trending::<(Vec<Video>, i64)>(&cache_key).await {
            return Ok(cached);
        }

        let result = self.videos.list_by_type(type_id, page, page_size).await?;
        self.cache.put_trending(cache_key, &result).await?;
        Ok(result)
    }

    /// §4.J entry point: cache-first against the merged catalog honoring `filters`; on
    /// an empty hit and `options.cache_only == false`, fan out to `sources` (gated by
    /// welfare eligibility), dedup the combined result, and apply the category filter.
    pub async fn aggregate(
        &self,
        filters: &AggregateFilters,
        options: &AggregateOptions,
        sources: &[Source],
    ) -> Result<(Vec<Video>, i64)> {
        let cache_key = Self::filters_cache_key(filters);
        if let Some(cached) = self.cache.get_trending::<(Vec<Video>, i64)>(&cache_key).await {
            if !cached.0.is_empty() {
                return Ok(cached);
            }
        }

        let list_filters = ListFilters {
            type_id: filters.type_id,
            sub_type_id: filters.sub_type_id,
            tag: filters.tag.clone(),
            area: filters.area.clone(),
            year: filters.year.clone(),
        };
        let sort = filters.sort.unwrap_or(ListSortOrder::Recency);
        let result = self.videos.list_filtered(&list_filters, sort, filters.page, filters.page_size).await?;
        if !result.0.is_empty() {
            self.cache.put_trending(cache_key, &result).await?;
            return Ok(result);
        }

        if options.cache_only {
            return Ok(result);
        }

        let eligible: Vec<Source> = Self::eligible_sources(sources, options.include_welfare, self.welfare_enabled);
        let category = filters.tag.as_deref().or(filters.area.as_deref());
        let parsed = self.fan_out_probe(&eligible, category).await;
        let fanned: Vec<Video> = parsed
            .iter()
            .flat_map(|list| list.videos.iter())
            .map(Self::parsed_video_into_stub)
            .collect();
        let deduped = Self::dedup_by_identity(fanned);
        let total = deduped.len() as i64;
        Ok((Self::apply_category_filter_if_enough(deduped, filters.type_id), total))
    }

    /// Active sources, excluding welfare sources unless the caller opted in **and**
    /// the system-wide switch is on (§4.J, §GLOSSARY "welfare source").
    #[must_use]
    pub fn eligible_sources(sources: &[Source], include_welfare: bool, welfare_enabled: bool) -> Vec<Source> {
        sources
            .iter()
            .filter(|s| s.active && (!s.welfare || (include_welfare && welfare_enabled)))
            .cloned()
            .collect()
    }

    fn filters_cache_key(filters: &AggregateFilters) -> String {
        format!(
            "agg:{:?}:{:?}:{:?}:{:?}:{:?}:{:?}:{}:{}",
            filters.type_id,
            filters.sub_type_id,
            filters.tag,
            filters.area,
            filters.year,
            filters.sort,
            filters.page,
            filters.page_size
        )
    }

    /// A fan-out probe only returns the upstream's own loosely-typed list row, not a
    /// catalogued `Video`; build an ephemeral stand-in carrying just the identity and
    /// completeness fields the dedup/filter steps need.
    fn parsed_video_into_stub(parsed: &super::response_parser::ParsedVideo) -> Video {
        let now = chrono::Utc::now();
        let mut video = Video {
            id: crate::models::VideoId::from_fingerprint(&parsed.name),
            name: parsed.name.clone(),
            year: parsed.year.clone(),
            area: parsed.area.clone(),
            language: String::new(),
            actors: Vec::new(),
            directors: Vec::new(),
            synopsis: parsed.content_raw.clone(),
            tags: Vec::new(),
            cover_url: parsed.pic.clone(),
            thumb_url: String::new(),
            remarks: parsed.remarks.clone(),
            rating: 0.0,
            type_id: 1,
            sub_type_id: None,
            source_names: Vec::new(),
            source_priority: 0,
            quality_score: 0,
            is_valid: true,
            play_urls: super::data_cleaner::DataCleaner::clean_play_urls(parsed),
            preview_episode_index: None,
            preview_url: None,
            shorts_category: None,
            created_at: now,
            updated_at: now,
        };
        video.quality_score = video.compute_quality_score();
        video
    }

    /// Fan out `ac=list` probes to every given source concurrently, with a per-source
    /// timeout and a single retry on a 5xx response, then dedup the merged results by
    /// `(name, year, area)` — only applying the post-merge category filter if the
    /// combined result has at least 3 rows (small result sets are returned unfiltered
    /// to avoid empty pages from an overzealous facet).
    pub async fn fan_out_probe(&self, sources: &[Source], category_id: Option<&str>) -> Vec<super::response_parser::ParsedVideoList> {
        let key = format!(
            "probe:{}:{}",
            sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(","),
            category_id.unwrap_or("-")
        );

        let urls: Vec<String> = sources.iter().map(|s| s.list_url(1, category_id)).collect();
        let bodies = self
            .singleflight
            .do_work(key, async move { Self::fetch_all(&urls).await })
            .await
            .unwrap_or_default();

        bodies
            .iter()
            .filter_map(|body| super::response_parser::ResponseParser::parse(body).ok())
            .collect()
    }

    async fn fetch_all(urls: &[String]) -> std::result::Result<Vec<String>, String> {
        let client = reqwest::Client::new();
        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            let client = client.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move { Self::fetch_with_retry(&client, &url).await }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            if let Ok(Some(body)) = handle.await {
                bodies.push(body);
            }
        }
        Ok(bodies)
    }

    async fn fetch_with_retry(client: &reqwest::Client, url: &str) -> Option<String> {
        for attempt in 0..2 {
            let response = tokio::time::timeout(Duration::from_secs(8), client.get(url).send()).await;
            match response {
                Ok(Ok(resp)) if resp.status().is_server_error() && attempt == 0 => continue,
                Ok(Ok(resp)) if resp.status().is_success() => {
                    return resp.text().await.ok();
                }
                _ => return None,
            }
        }
        None
    }

    /// Dedup a merged result set by `(name, year, area)` (§4.J), keeping whichever
    /// occurrence has the higher completeness (`quality_score`) on a collision rather
    /// than whichever source happened to answer first. First-seen order is preserved
    /// for the surviving rows.
    #[must_use]
    pub fn dedup_by_identity(videos: Vec<Video>) -> Vec<Video> {
        let mut slot_of: std::collections::HashMap<(String, String, String), usize> = std::collections::HashMap::new();
        let mut kept: Vec<Video> = Vec::new();
        for video in videos {
            let key = (video.name.clone(), video.year.clone(), video.area.clone());
            match slot_of.get(&key) {
                Some(&slot) if kept[slot].quality_score >= video.quality_score => {}
                Some(&slot) => kept[slot] = video,
                None => {
                    slot_of.insert(key, kept.len());
                    kept.push(video);
                }
            }
        }
        kept
    }

    /// Apply a post-merge category filter, but only if doing so leaves at least 3
    /// rows — otherwise the unfiltered set is returned (§4.J: avoid empty pages from
    /// an overzealous facet on a small result set).
    #[must_use]
    pub fn apply_category_filter_if_enough(videos: Vec<Video>, type_id: Option<i16>) -> Vec<Video> {
        let Some(type_id) = type_id else { return videos };
        let filtered: Vec<Video> = videos.iter().filter(|v| v.type_id == type_id).cloned().collect();
        if filtered.len() >= 3 {
            filtered
        } else {
            videos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::VideoId;
    use std::collections::HashMap;

    fn video(name: &str, year: &str, area: &str, type_id: i16) -> Video {
        let now = Utc::now();
        Video {
            id: VideoId::from_fingerprint(&format!("{name}{year}{area}")),
            name: name.to_string(),
            year: year.to_string(),
            area: area.to_string(),
            language: String::new(),
            actors: vec![],
            directors: vec![],
            synopsis: String::new(),
            tags: vec![],
            cover_url: String::new(),
            thumb_url: String::new(),
            remarks: String::new(),
            rating: 0.0,
            type_id,
            sub_type_id: None,
            source_names: vec![],
            source_priority: 0,
            quality_score: 0,
            is_valid: true,
            play_urls: HashMap::new(),
            preview_episode_index: None,
            preview_url: None,
            shorts_category: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_dedup_by_identity() {
        let videos = vec![video("A", "2020", "CN", 1), video("A", "2020", "CN", 1), video("B", "2020", "CN", 1)];
        assert_eq!(Aggregator::dedup_by_identity(videos).len(), 2);
    }

    #[test]
    fn test_dedup_by_identity_keeps_higher_completeness() {
        let mut richer = video("A", "2020", "CN", 1);
        richer.quality_score = 80;
        richer.cover_url = "https://x.com/cover.jpg".to_string();
        let mut poorer = video("A", "2020", "CN", 1);
        poorer.quality_score = 10;

        let deduped = Aggregator::dedup_by_identity(vec![poorer, richer.clone()]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].quality_score, 80);
        assert_eq!(deduped[0].cover_url, richer.cover_url);
    }

    #[test]
    fn test_eligible_sources_gates_welfare() {
        let welfare_source = crate::models::Source {
            id: crate::models::SourceId::from_string("w".to_string()),
            name: "W".to_string(),
            base_url: "https://w.example".to_string(),
            weight: 1,
            active: true,
            format: crate::models::ResponseFormat::Auto,
            welfare: true,
        };
        let normal_source = crate::models::Source {
            id: crate::models::SourceId::from_string("n".to_string()),
            name: "N".to_string(),
            base_url: "https://n.example".to_string(),
            weight: 1,
            active: true,
            format: crate::models::ResponseFormat::Auto,
            welfare: false,
        };
        let sources = vec![welfare_source, normal_source];

        // System switch off: welfare source excluded even if the caller opts in.
        assert_eq!(Aggregator::eligible_sources(&sources, true, false).len(), 1);
        // System switch on, caller opts in: both sources eligible.
        assert_eq!(Aggregator::eligible_sources(&sources, true, true).len(), 2);
        // System switch on, caller does not opt in: welfare source still excluded.
        assert_eq!(Aggregator::eligible_sources(&sources, false, true).len(), 1);
    }

    #[test]
    fn test_category_filter_only_applies_with_enough_rows() {
        let videos = vec![video("A", "2020", "CN", 1), video("B", "2020", "CN", 2)];
        let filtered = Aggregator::apply_category_filter_if_enough(videos.clone(), Some(1));
        assert_eq!(filtered.len(), 2, "fewer than 3 matches, filter should be skipped");

        let bigger = vec![
            video("A", "2020", "CN", 1),
            video("B", "2020", "CN", 1),
            video("C", "2020", "CN", 1),
            video("D", "2020", "CN", 2),
        ];
        let filtered = Aggregator::apply_category_filter_if_enough(bigger, Some(1));
        assert_eq!(filtered.len(), 3);
    }
}
