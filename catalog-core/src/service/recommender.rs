//! Recommendation engine (§4.K).
//!
//! `content_based`/`similar`/`shorts_similar` score catalog videos against a seed
//! video with the weighted similarity formula below and persist the top neighbors via
//! `RecommendationRepository`. `trending` ranks by a composite of hits, quality, and
//! recency. `collaborative`/`personalized` take a caller-supplied, ephemeral watch
//! history (§1 Non-goals: the platform does not persist user accounts, so there is no
//! durable per-user profile to read here) and blend it with `content_based` scores.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::CacheManager;
use crate::models::{HitStats, Video, VideoId};
use crate::repository::{AccessLogRepository, RecommendationRepository};
use crate::Result;

/// Which precomputed (or on-the-fly) strategy produced a recommendation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationStrategy {
    ContentBased,
    Collaborative,
    Trending,
    Personalized,
    Similar,
    ShortsSimilar,
}

impl RecommendationStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentBased => "content_based",
            Self::Collaborative => "collaborative",
            Self::Trending => "trending",
            Self::Personalized => "personalized",
            Self::Similar => "similar",
            Self::ShortsSimilar => "shorts_similar",
        }
    }
}

pub struct Recommender {
    recommendations: Arc<RecommendationRepository>,
    access_log: Arc<AccessLogRepository>,
    cache: Arc<CacheManager>,
}

impl Recommender {
    #[must_use]
    pub fn new(
        recommendations: Arc<RecommendationRepository>,
        access_log: Arc<AccessLogRepository>,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self { recommendations, access_log, cache }
    }

    /// §4.K similarity formula:
    /// `0.30·[same type] + 0.15·[same area] + 0.10·[year proximity, within 3y] +
    ///  0.25·[actor overlap / min(|actors_a|, 3)] + 0.20·[tag overlap / min(|tags_a|, 5)]`
    #[must_use]
    pub fn similarity(a: &Video, b: &Video) -> f64 {
        let same_type = f64::from(u8::from(a.type_id == b.type_id));
        let same_area = f64::from(u8::from(!a.area.is_empty() && a.area == b.area));

        let year_term = match (a.year.parse::<i32>(), b.year.parse::<i32>()) {
            (Ok(ya), Ok(yb)) => {
                let diff = (ya - yb).abs();
                if diff <= 3 {
                    1.0 - f64::from(diff) / 3.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let actor_overlap = overlap_ratio(&a.actors, &b.actors, 3);
        let tag_overlap = overlap_ratio(&a.tags, &b.tags, 5);

        0.30 * same_type + 0.15 * same_area + 0.10 * year_term + 0.25 * actor_overlap + 0.20 * tag_overlap
    }

    /// Score `seed` against every candidate, keep the top `limit`, and persist the
    /// neighbor set under `strategy`.
    pub async fn precompute_content_based(
        &self,
        seed: &Video,
        candidates: &[Video],
        strategy: RecommendationStrategy,
        limit: usize,
    ) -> Result<Vec<(VideoId, f64)>> {
        let mut scored: Vec<(VideoId, f64)> = candidates
            .iter()
            .filter(|c| c.id != seed.id)
            .map(|c| (c.id.clone(), Self::similarity(seed, c)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        self.recommendations.replace_neighbors(&seed.id, strategy.as_str(), &scored).await?;
        Ok(scored)
    }

    /// §4.K trending composite: `0.4·hits + 0.3·(score·1000) + 0.3·recency_term`,
    /// where `recency_term = seconds_since_update / -86400` (a negative, decaying term
    /// that penalizes staleness rather than rewarding recency additively).
    #[must_use]
    pub fn trending_score(hits: &HitStats, quality_score: i32, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let seconds_since_update = now.signed_duration_since(updated_at).num_seconds() as f64;
        let recency_term = seconds_since_update / -86400.0;
        0.4 * hits.day as f64 + 0.3 * (f64::from(quality_score) * 1000.0 / 100.0) + 0.3 * recency_term
    }

    /// Rank candidates by the trending composite, cached `trending_cache_ttl_s` per
    /// `(category, window)`.
    pub async fn trending(&self, category: &str, candidates: &[Video], limit: usize) -> Result<Vec<(VideoId, f64)>> {
        let cache_key = format!("{category}:daily");
        if let Some(cached) = self.cache.get_trending::<Vec<(VideoId, f64)>>(&cache_key).await {
            return Ok(cached);
        }

        let now = Utc::now();
        let mut scored = Vec::with_capacity(candidates.len());
        for video in candidates {
            let hits = self.access_log.stats_for_video(&video.id, now.date_naive()).await?;
            let score = Self::trending_score(&hits, video.quality_score, video.updated_at, now);
            scored.push((video.id.clone(), score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        self.cache.put_trending(cache_key, &scored).await?;
        Ok(scored)
    }

    /// `personalized`/`collaborative`: blend `content_based` scores for each video in
    /// the caller-supplied ephemeral watch history, weighting more recently watched
    /// videos higher. `watch_history` is ordered oldest-first.
    pub async fn personalized(
        &self,
        watch_history: &[Video],
        candidates: &[Video],
        limit: usize,
    ) -> Vec<(VideoId, f64)> {
        if watch_history.is_empty() {
            return Vec::new();
        }

        let mut scores: std::collections::HashMap<VideoId, f64> = std::collections::HashMap::new();
        let n = watch_history.len();
        for (idx, seed) in watch_history.iter().enumerate() {
            let recency_weight = (idx + 1) as f64 / n as f64;
            for candidate in candidates {
                if watch_history.iter().any(|w| w.id == candidate.id) {
                    continue;
                }
                let sim = Self::similarity(seed, candidate);
                if sim <= 0.0 {
                    continue;
                }
                *scores.entry(candidate.id.clone()).or_insert(0.0) += sim * recency_weight;
            }
        }

        let mut ranked: Vec<(VideoId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        ranked
    }

    pub async fn neighbors(&self, video_id: &VideoId, strategy: RecommendationStrategy) -> Result<Vec<(VideoId, f64)>> {
        let entries = self.recommendations.get_neighbors(video_id, strategy.as_str()).await?;
        Ok(entries.into_iter().map(|e| (e.similar_video_id, e.confidence)).collect())
    }
}

/// Jaccard-style overlap of `a` against `b`, normalized by `min(|a|, cap)` per §4.K
/// (so a seed with many actors/tags doesn't get an unfairly tiny overlap ratio).
fn overlap_ratio(a: &[String], b: &[String], cap: usize) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let b_set: std::collections::HashSet<&String> = b.iter().collect();
    let shared = a.iter().filter(|x| b_set.contains(x)).count();
    let denom = a.len().min(cap) as f64;
    (shared as f64 / denom).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn video(type_id: i16, area: &str, year: &str, actors: Vec<&str>, tags: Vec<&str>) -> Video {
        let now = Utc::now();
        Video {
            id: VideoId::from_fingerprint(&format!("{type_id}{area}{year}")),
            name: "x".into(),
            year: year.into(),
            area: area.into(),
            language: String::new(),
            actors: actors.into_iter().map(String::from).collect(),
            directors: vec![],
            synopsis: String::new(),
            tags: tags.into_iter().map(String::from).collect(),
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
    fn test_similarity_identical_videos_is_high() {
        let a = video(1, "美国", "2010", vec!["甲", "乙"], vec!["悬疑"]);
        let b = video(1, "美国", "2010", vec!["甲", "乙"], vec!["悬疑"]);
        let score = Recommender::similarity(&a, &b);
        assert!(score > 0.9, "expected near-max similarity, got {score}");
    }

    #[test]
    fn test_similarity_different_type_drops_score() {
        let a = video(1, "美国", "2010", vec![], vec![]);
        let b = video(2, "美国", "2010", vec![], vec![]);
        let score = Recommender::similarity(&a, &b);
        assert!(score < 0.3);
    }

    #[test]
    fn test_year_term_decays_beyond_3_years() {
        let a = video(1, "美国", "2010", vec![], vec![]);
        let far = video(1, "美国", "2020", vec![], vec![]);
        let near = video(1, "美国", "2011", vec![], vec![]);
        assert!(Recommender::similarity(&a, &near) > Recommender::similarity(&a, &far));
    }

    #[test]
    fn test_overlap_ratio_caps_denominator() {
        let ratio = overlap_ratio(
            &["a".into(), "b".into(), "c".into(), "d".into()],
            &["a".into()],
            3,
        );
        assert!((ratio - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_trending_score_penalizes_staleness() {
        let now = Utc::now();
        let stats = HitStats { day: 10, week: 50, month: 100, all_time: 1000 };
        let fresh = Recommender::trending_score(&stats, 80, now, now);
        let stale = Recommender::trending_score(&stats, 80, now - chrono::Duration::days(10), now);
        assert!(fresh > stale);
    }
}
