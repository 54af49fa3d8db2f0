//! Catalog Store: dedup/merge of incoming videos into the canonical catalog (§4.G).
//!
//! The write path a collection run actually drives. `ingest` runs the five-step
//! match ladder against already-catalogued videos, merges into whichever row it
//! finds (or creates a new one, keyed by a deterministic fingerprint hash), and the
//! housekeeping pass (`merge_duplicates`/`cleanup_duplicates`) cleans up whatever the
//! ladder didn't catch because two sources disagreed on spelling or metadata order.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use serde::{Deserialize, Serialize};

use crate::cache::KeyBuilder;
use crate::models::{Episode, IncomingVideo, PlayUrls, TypeId, Video, VideoId};
use crate::repository::VideoRepository;
use crate::service::data_cleaner::DataCleaner;
use crate::service::distributed_lock::DistributedLock;
use crate::Result;

/// Language suffix tokens recognized when grouping same-title releases into versions
/// (§4.G version grouping). A title carrying none of these is the default language.
const LANGUAGE_TOKENS: &[&str] = &["国语", "粤语", "原声", "英语", "日语", "韩语", "中字", "字幕"];

/// Quality suffix tokens recognized alongside `LANGUAGE_TOKENS`.
const QUALITY_TOKENS: &[&str] = &["4K", "1080P", "1080p", "720P", "720p", "蓝光", "超清", "高清", "HD"];

/// Language assigned to a title carrying no recognized `LANGUAGE_TOKENS` entry.
const DEFAULT_LANGUAGE: &str = "原声";

/// One play-URL route from a version-grouped title, tagged with the language/quality
/// its originating release carried (§4.G version grouping). Distinct from `PlaySource`,
/// which has no such tagging and describes a single already-merged video's own routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaySourceWithLang {
    pub name: String,
    pub language: String,
    pub quality: Option<String>,
    pub episodes: Vec<Episode>,
}

/// Read-time result of grouping same-title releases by language/quality (§4.G, P6).
/// Non-mutating: unlike `merge_duplicates`, building a `VersionGroup` never writes to
/// the catalog or soft-deletes anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionGroup {
    pub base_name: String,
    pub year: String,
    /// The highest-`quality_score` version, used for display fields (synopsis, cover, etc).
    pub primary: Video,
    /// Every version's play routes, deduped by `(name, language)` keeping the higher
    /// episode count.
    pub sources: Vec<PlaySourceWithLang>,
    pub available_languages: Vec<String>,
    pub available_qualities: Vec<String>,
}

pub struct CatalogStore {
    videos: Arc<VideoRepository>,
    lock: Arc<DistributedLock>,
    keys: KeyBuilder,
}

impl CatalogStore {
    #[must_use]
    pub fn new(videos: Arc<VideoRepository>, lock: Arc<DistributedLock>, keys: KeyBuilder) -> Self {
        Self { videos, lock, keys }
    }

    /// Fingerprint used both for `VideoId` derivation and per-video write serialization.
    /// Every input is lowercased and whitespace-stripped first (§3/P3) so e.g. `"The
    /// Matrix"` and `"the   matrix"` collapse onto the same `video_id`.
    #[must_use]
    pub fn fingerprint(incoming: &IncomingVideo) -> String {
        format!(
            "{}|{}|{}|{}",
            normalize_fingerprint_field(&incoming.name),
            normalize_fingerprint_field(&incoming.year),
            normalize_fingerprint_field(&incoming.area),
            incoming.directors.first().map(|d| normalize_fingerprint_field(d)).unwrap_or_default(),
        )
    }

    /// §4.G steps 1-5: locate an already-catalogued video matching an incoming candidate.
    ///
    /// Steps 1-3 match on progressively looser combinations of name/year/director.
    /// Step 4 (loose name-only) only fires when the incoming record carries **neither**
    /// a year nor a director — otherwise a same-name-different-year row would wrongly
    /// absorb it. Step 5 instead backfills: if the incoming record does have a year,
    /// but nothing above matched, it looks for a same-name row whose year is still
    /// blank, so `merge`'s year-backfill logic can fill it in.
    pub async fn find_existing(&self, incoming: &IncomingVideo) -> Result<Option<Video>> {
        if !incoming.year.is_empty() && !incoming.area.is_empty() {
            if let Some(v) = self.videos.find_exact(&incoming.name, &incoming.year, &incoming.area).await? {
                return Ok(Some(v));
            }
        }
        if !incoming.year.is_empty() {
            if let Some(v) = self.videos.find_by_name_year(&incoming.name, &incoming.year).await? {
                return Ok(Some(v));
            }
        }
        if let Some(director) = incoming.directors.first() {
            if let Some(v) = self.videos.find_by_name_director(&incoming.name, director).await? {
                return Ok(Some(v));
            }
        }

        if incoming.year.is_empty() && incoming.directors.is_empty() {
            // step 4: loose name-only, best quality first
            let loose = self.videos.find_by_name_loose(&incoming.name).await?;
            return Ok(loose.into_iter().next());
        }

        if !incoming.year.is_empty() {
            // step 5: same name, year not yet known — backfill target, not a full match.
            if let Some(v) = self.videos.find_by_name_year_empty(&incoming.name).await? {
                return Ok(Some(v));
            }
        }

        Ok(None)
    }

    /// Ingest one cleaned, classified candidate: merge into an existing row or create
    /// a new one. Serialized per-fingerprint via the distributed lock so two sources
    /// observing the same video concurrently cannot race each other into two rows.
    pub async fn ingest(
        &self,
        incoming: IncomingVideo,
        source_weight: i32,
        type_id: i16,
        sub_type_id: Option<i32>,
        sub_type_name: Option<String>,
    ) -> Result<(Video, bool)> {
        let fingerprint = Self::fingerprint(&incoming);
        let lock_key = self.keys.video_fingerprint_lock(&short_hash(&fingerprint));

        self.lock
            .with_lock(&lock_key, 10, || {
                self.ingest_locked(incoming, source_weight, type_id, sub_type_id, sub_type_name.clone())
            })
            .await
    }

    async fn ingest_locked(
        &self,
        incoming: IncomingVideo,
        source_weight: i32,
        type_id: i16,
        sub_type_id: Option<i32>,
        sub_type_name: Option<String>,
    ) -> Result<(Video, bool)> {
        match self.find_existing(&incoming).await? {
            Some(existing) => {
                let merged = self.merge(existing, &incoming, source_weight, sub_type_name.as_deref());
                let saved = self.videos.update(&merged).await?;
                Ok((saved, false))
            }
            None => {
                let now = Utc::now();
                let fingerprint = Self::fingerprint(&incoming);
                let video = Video {
                    id: VideoId::from_fingerprint(&fingerprint),
                    name: incoming.name,
                    year: incoming.year,
                    area: incoming.area,
                    language: incoming.language,
                    actors: incoming.actors,
                    directors: incoming.directors,
                    synopsis: incoming.synopsis,
                    tags: incoming.tags,
                    cover_url: incoming.cover_url,
                    thumb_url: incoming.thumb_url,
                    remarks: incoming.remarks,
                    rating: incoming.rating,
                    type_id,
                    sub_type_id,
                    source_names: vec![incoming.source_name],
                    source_priority: source_weight,
                    quality_score: 0,
                    is_valid: true,
                    play_urls: incoming.play_urls,
                    preview_episode_index: None,
                    preview_url: None,
                    shorts_category: sub_type_name,
                    created_at: now,
                    updated_at: now,
                };
                let mut video = video;
                video.quality_score = video.compute_quality_score();
                Self::apply_preview(&mut video);
                let saved = self.videos.create(&video).await?;
                Ok((saved, true))
            }
        }
    }

    /// Merge an incoming candidate into an existing row, preferring richer fields and
    /// union-ing play routes/source names. Year backfill (§4.G step 5): an existing row
    /// missing a year inherits the incoming value.
    fn merge(&self, mut existing: Video, incoming: &IncomingVideo, source_weight: i32, sub_type_name: Option<&str>) -> Video {
        if existing.shorts_category.is_none() {
            existing.shorts_category = sub_type_name.map(str::to_string);
        }
        if existing.year.is_empty() && !incoming.year.is_empty() {
            existing.year = incoming.year.clone();
        }
        if existing.area.is_empty() && !incoming.area.is_empty() {
            existing.area = incoming.area.clone();
        }
        if existing.synopsis.chars().count() < incoming.synopsis.chars().count() {
            existing.synopsis = incoming.synopsis.clone();
        }
        if existing.cover_url.is_empty() && !incoming.cover_url.is_empty() {
            existing.cover_url = incoming.cover_url.clone();
        }
        if existing.actors.is_empty() {
            existing.actors = incoming.actors.clone();
        }
        if existing.directors.is_empty() {
            existing.directors = incoming.directors.clone();
        }

        existing.play_urls = DataCleaner::merge_cleaned(&existing.play_urls, &incoming.play_urls);

        if !existing.source_names.iter().any(|s| s == &incoming.source_name) {
            existing.source_names.push(incoming.source_name.clone());
        }
        existing.source_priority = existing.source_priority.max(source_weight);

        existing.quality_score = existing.compute_quality_score();
        existing.updated_at = Utc::now();
        Self::apply_preview(&mut existing);
        existing
    }

    /// Keyword → shorts sub-category, scored over name (3x weight) and synopsis/tags
    /// (§4.G shorts sub-category derivation). First scanned source wins ties since
    /// categories are listed in rough popularity order.
    const SHORTS_CATEGORIES: &'static [&'static str] =
        &["霸总", "战神", "古装", "都市", "甜宠", "复仇", "玄幻"];

    /// §4.G shorts preview selection, restricted to ShortDrama inserts/merges: pick a
    /// random episode index in `[min(3, N), min(8, N)]` from the first non-empty route,
    /// and resolve the shorts sub-category from the classifier or, failing that, by
    /// scanning the title/synopsis/tags for known keyword stems.
    fn apply_preview(video: &mut Video) {
        if video.type_id != TypeId::ShortDrama.as_i16() {
            return;
        }

        if video.shorts_category.is_none() {
            video.shorts_category = Self::derive_shorts_category(video);
        }

        let Some((route_name, episodes)) = video.play_urls.iter().find(|(_, eps)| !eps.is_empty()) else {
            return;
        };
        let n = episodes.len();
        if n == 0 {
            return;
        }
        let lo = 3.min(n - 1);
        let hi = 8.min(n - 1);
        let idx = if lo >= hi {
            lo
        } else {
            rand::rng().random_range(lo..=hi)
        };
        video.preview_episode_index = Some(idx as i32);
        video.preview_url = episodes.get(idx).map(|e: &Episode| e.url.clone());
        let _ = route_name;
    }

    /// Score each known shorts keyword against the name (weight 3) and the
    /// synopsis/tags (weight 1), returning the highest-scoring hit, if any.
    fn derive_shorts_category(video: &Video) -> Option<String> {
        let haystack_minor = format!("{} {}", video.synopsis, video.tags.join(" "));
        let mut best: Option<(&str, u32)> = None;
        for keyword in Self::SHORTS_CATEGORIES {
            let mut score = 0u32;
            if video.name.contains(keyword) {
                score += 3;
            }
            if haystack_minor.contains(keyword) {
                score += 1;
            }
            if score == 0 {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((keyword, score));
            }
        }
        best.map(|(k, _)| k.to_string())
    }

    /// §4.G version grouping: peel a trailing language token, then a quality token,
    /// off a title, returning `(base_name, language, quality)`. A title carrying no
    /// recognized language token is assigned `DEFAULT_LANGUAGE` ("原声").
    #[must_use]
    pub fn extract_base_and_tags(name: &str) -> (String, String, Option<String>) {
        let mut base = name.trim().to_string();

        let mut language: Option<&str> = None;
        for token in LANGUAGE_TOKENS.iter().copied() {
            if base.contains(token) {
                language.get_or_insert(token);
                base = base.replace(token, "");
            }
        }

        let mut quality: Option<&str> = None;
        for token in QUALITY_TOKENS.iter().copied() {
            if base.contains(token) {
                quality.get_or_insert(token);
                base = base.replace(token, "");
            }
        }

        let base = base
            .trim()
            .trim_matches(|c| matches!(c, '(' | ')' | '【' | '】' | '[' | ']'))
            .trim()
            .to_string();
        (base, language.unwrap_or(DEFAULT_LANGUAGE).to_string(), quality.map(str::to_string))
    }

    /// Base name two differently-tagged releases share; see `extract_base_and_tags`.
    #[must_use]
    pub fn extract_meta(name: &str) -> String {
        Self::extract_base_and_tags(name).0
    }

    /// Find every catalogued row that is plausibly a different release of the same
    /// title/year (§4.G version grouping).
    pub async fn find_all_versions(&self, name: &str, year: &str) -> Result<Vec<Video>> {
        let base = Self::extract_meta(name);
        let pattern = format!("%{base}%");
        self.videos.find_by_base_name(&pattern, year).await
    }

    /// `find_all_versions`, keyed by an already-catalogued video's id: loads it, then
    /// groups by its own name/year.
    pub async fn find_all_versions_by_id(&self, id: &VideoId) -> Result<Vec<Video>> {
        match self.videos.get_by_id(id).await? {
            Some(video) => self.find_all_versions(&video.name, &video.year).await,
            None => Ok(Vec::new()),
        }
    }

    /// Read-time version grouping (§4.G, P6): group `versions` (as returned by
    /// `find_all_versions`) into one `VersionGroup`. Picks the highest-`quality_score`
    /// row as primary, collects every version's play routes tagged with the
    /// language/quality extracted from its own name, deduped by `(route name,
    /// language)` keeping whichever has the more episodes, and unions the languages
    /// and qualities seen across all versions. Non-mutating: no catalog write happens.
    #[must_use]
    pub fn merge_versions(versions: Vec<Video>) -> Option<VersionGroup> {
        let primary = versions.iter().max_by_key(|v| v.quality_score)?.clone();
        let (base_name, _, _) = Self::extract_base_and_tags(&primary.name);

        let mut available_languages: Vec<String> = Vec::new();
        let mut available_qualities: Vec<String> = Vec::new();
        let mut sources: Vec<PlaySourceWithLang> = Vec::new();

        for version in &versions {
            let (_, language, title_quality) = Self::extract_base_and_tags(&version.name);
            if !available_languages.contains(&language) {
                available_languages.push(language.clone());
            }
            if let Some(q) = &title_quality {
                if !available_qualities.contains(q) {
                    available_qualities.push(q.clone());
                }
            }

            for (route_name, episodes) in &version.play_urls {
                // Quality isn't always in the title; a line named e.g. "4K" carries
                // its own signal when the title itself doesn't.
                let quality = title_quality.clone().or_else(|| {
                    QUALITY_TOKENS.iter().copied().find(|t| route_name.contains(*t)).map(str::to_string)
                });
                if let Some(q) = &quality {
                    if !available_qualities.contains(q) {
                        available_qualities.push(q.clone());
                    }
                }

                match sources.iter_mut().find(|s| s.name == *route_name && s.language == language) {
                    Some(existing) if existing.episodes.len() >= episodes.len() => {}
                    Some(existing) => {
                        existing.episodes = episodes.clone();
                        existing.quality = quality;
                    }
                    None => sources.push(PlaySourceWithLang {
                        name: route_name.clone(),
                        language: language.clone(),
                        quality,
                        episodes: episodes.clone(),
                    }),
                }
            }
        }

        Some(VersionGroup {
            base_name,
            year: primary.year.clone(),
            primary,
            sources,
            available_languages,
            available_qualities,
        })
    }

    /// Housekeeping merge of one group of same-name rows into a single canonical row:
    /// union play routes/source names into the highest-quality row, save it, and
    /// soft-delete the rest. Distinct from the public (non-mutating) `merge_versions`.
    async fn physically_merge(&self, mut rows: Vec<Video>) -> Result<Option<Video>> {
        if rows.len() < 2 {
            return Ok(rows.pop());
        }
        rows.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
        let mut canonical = rows.remove(0);

        for other in &rows {
            canonical.play_urls = merge_play_urls_union(&canonical.play_urls, &other.play_urls);
            for name in &other.source_names {
                if !canonical.source_names.contains(name) {
                    canonical.source_names.push(name.clone());
                }
            }
        }
        canonical.quality_score = canonical.compute_quality_score();
        canonical.updated_at = Utc::now();
        let saved = self.videos.update(&canonical).await?;

        for other in &rows {
            self.videos.delete(&other.id).await?;
        }
        Ok(Some(saved))
    }

    /// Housekeeping pass: for every name with more than one valid row, merge them
    /// down to a single canonical row (§4.G duplicate merge housekeeping).
    pub async fn merge_duplicates(&self) -> Result<usize> {
        let names = self.videos.names_with_duplicates().await?;
        let mut merged_count = 0;
        for name in names {
            let rows = self.videos.find_all_by_name(&name).await?;
            if rows.len() > 1 {
                self.physically_merge(rows).await?;
                merged_count += 1;
            }
        }
        Ok(merged_count)
    }

    /// GC pass: physically delete rows that have been soft-deleted for more than
    /// `older_than_days` (default 30, per the scheduler's weekly GC routine).
    pub async fn cleanup_duplicates(&self, older_than_days: i64) -> Result<usize> {
        let stale = self.videos.find_stale_invalid(older_than_days).await?;
        if stale.is_empty() {
            return Ok(0);
        }
        self.videos.delete_batch_with_executor(&stale, self.videos.pool()).await
    }
}

fn merge_play_urls_union(a: &PlayUrls, b: &PlayUrls) -> PlayUrls {
    let mut merged = a.clone();
    for (route, episodes) in b {
        merged.entry(route.clone()).or_insert_with(|| episodes.clone());
    }
    merged
}

/// Short, stable hash of a fingerprint for use in Redis lock keys (keeps keys bounded
/// in length regardless of how long a video's name/director string is).
fn short_hash(fingerprint: &str) -> String {
    format!("{:x}", md5::compute(fingerprint.as_bytes()))
}

/// Lowercase and strip all whitespace from a fingerprint input field (§3/P3).
fn normalize_fingerprint_field(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn incoming() -> IncomingVideo {
        IncomingVideo {
            source_name: "demo".to_string(),
            name: "禁闭岛".to_string(),
            year: "2010".to_string(),
            area: "美国".to_string(),
            directors: vec!["马丁·斯科塞斯".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = CatalogStore::fingerprint(&incoming());
        let b = CatalogStore::fingerprint(&incoming());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        let mut upper = incoming();
        upper.name = "The Matrix".to_string();
        let mut spaced_lower = incoming();
        spaced_lower.name = "the   matrix".to_string();
        assert_eq!(CatalogStore::fingerprint(&upper), CatalogStore::fingerprint(&spaced_lower));
    }

    #[test]
    fn test_extract_meta_strips_known_tokens() {
        assert_eq!(CatalogStore::extract_meta("禁闭岛(国语)"), "禁闭岛");
        assert_eq!(CatalogStore::extract_meta("禁闭岛 1080p"), "禁闭岛");
    }

    #[test]
    fn test_extract_base_and_tags_defaults_to_original_audio() {
        let (base, language, quality) = CatalogStore::extract_base_and_tags("禁闭岛4K");
        assert_eq!(base, "禁闭岛");
        assert_eq!(language, "原声");
        assert_eq!(quality.as_deref(), Some("4K"));
    }

    /// §8 scenario 5: `{禁闭岛国语4K, 禁闭岛4K, 禁闭岛粤语}` all year 2010 group to base
    /// `禁闭岛` with `available_languages = {国语, 原声, 粤语}`.
    #[test]
    fn test_merge_versions_groups_languages_and_qualities() {
        let mandarin = version("禁闭岛国语4K", 80, "m3u8", 12);
        let original = version("禁闭岛4K", 60, "m3u8", 10);
        let cantonese = version("禁闭岛粤语", 50, "m3u8", 8);

        let group = CatalogStore::merge_versions(vec![mandarin, original, cantonese]).expect("group");
        assert_eq!(group.base_name, "禁闭岛");
        assert_eq!(group.primary.quality_score, 80);

        let langs: std::collections::HashSet<_> = group.available_languages.iter().cloned().collect();
        assert_eq!(
            langs,
            std::collections::HashSet::from(["国语".to_string(), "原声".to_string(), "粤语".to_string()])
        );
        assert!(group.available_qualities.contains(&"4K".to_string()));
        // Every version's route carries a distinct language, so none collide.
        assert_eq!(group.sources.len(), 3);
    }

    #[test]
    fn test_merge_versions_dedups_same_language_keeping_more_episodes() {
        let thin = version("禁闭岛1080P", 70, "m3u8", 5);
        let thick = version("禁闭岛 1080P", 60, "m3u8", 20);

        let group = CatalogStore::merge_versions(vec![thin, thick]).expect("group");
        assert_eq!(group.sources.len(), 1);
        assert_eq!(group.sources[0].episodes.len(), 20);
    }

    fn version(name: &str, quality_score: i32, route: &str, episode_count: usize) -> Video {
        let mut video = sample_video();
        video.name = name.to_string();
        video.quality_score = quality_score;
        let episodes: Vec<Episode> = (1..=episode_count)
            .map(|i| Episode { label: format!("第{i}集"), url: format!("https://x.com/{name}/{i}.m3u8") })
            .collect();
        let mut play_urls: PlayUrls = HashMap::new();
        play_urls.insert(route.to_string(), episodes);
        video.play_urls = play_urls;
        video
    }

    #[test]
    fn test_apply_preview_picks_in_range() {
        let mut routes: PlayUrls = HashMap::new();
        let episodes: Vec<Episode> = (1..=12)
            .map(|i| Episode { label: format!("第{i}集"), url: format!("https://x.com/{i}.m3u8") })
            .collect();
        routes.insert("m3u8".to_string(), episodes);
        let mut video = sample_video();
        video.play_urls = routes;
        CatalogStore::apply_preview(&mut video);
        let idx = video.preview_episode_index.expect("preview set");
        assert!((3..=8).contains(&idx));
    }

    fn sample_video() -> Video {
        let now = Utc::now();
        Video {
            id: VideoId::from_fingerprint("x"),
            name: "禁闭岛".into(),
            year: "2010".into(),
            area: "美国".into(),
            language: String::new(),
            actors: vec![],
            directors: vec![],
            synopsis: String::new(),
            tags: vec![],
            cover_url: String::new(),
            thumb_url: String::new(),
            remarks: String::new(),
            rating: 0.0,
            type_id: 1,
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
}
