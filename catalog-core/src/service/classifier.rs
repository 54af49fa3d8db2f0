//! Video taxonomy classifier (§4.C).
//!
//! Tries, in order: declared `type_name` against known patterns, synopsis/title
//! content keywords, the source's own `type_id` mapped through `category_mappings`,
//! actor/director lists against a hard-coded adult/variety roster, and finally the
//! video name itself, before falling back to `Movie` at low confidence. The DB-backed
//! mapping table is cached for 5 minutes via `CacheManager` so a hot classification
//! path never blocks on a query per video.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::models::{ClassifyMethod, ClassifyResult, IncomingVideo, TypeId};
use crate::repository::ClassifierRepository;
use crate::Result;

/// §4.C hard-coded fallback rules, consulted when the DB mapping table has no entry
/// for a source's `type_id`/`type_name`.
pub mod rules {
    /// One `type_name` classification rule: fires when any `patterns` substring is
    /// present and no `excludes` substring is, first match wins. Ordered by priority
    /// per §4.C: Trailer/Adult are checked first so neither is captured by a looser
    /// downstream rule, ShortDrama before TVSeries (so "短剧" never falls through to
    /// the generic "剧" pattern), Movie before TVSeries (with TVSeries excluding
    /// movie-style "...片" genre tags so e.g. "动作片" cannot be mis-read as a series).
    pub struct TypeNameRule {
        pub type_id: i16,
        pub patterns: &'static [&'static str],
        pub excludes: &'static [&'static str],
        pub suffix_patterns: &'static [&'static str],
    }

    pub const TYPE_NAME_RULES: &[TypeNameRule] = &[
        TypeNameRule { type_id: 8, patterns: &["预告"], excludes: &[], suffix_patterns: &[] },
        TypeNameRule {
            type_id: 9,
            patterns: &["福利", "伦理", "写真", "成人", "情色"],
            excludes: &[],
            suffix_patterns: &[],
        },
        TypeNameRule { type_id: 5, patterns: &["短剧", "竖屏剧", "微短剧"], excludes: &[], suffix_patterns: &[] },
        TypeNameRule {
            type_id: 1,
            patterns: &["电影", "影片", "剧场版"],
            excludes: &["电视剧", "剧集", "连续剧"],
            suffix_patterns: &["片"],
        },
        TypeNameRule {
            type_id: 2,
            patterns: &["电视剧", "剧集", "连续剧", "剧"],
            excludes: &["短剧", "电影", "剧场版"],
            suffix_patterns: &[],
        },
        TypeNameRule { type_id: 3, patterns: &["综艺", "真人秀", "脱口秀"], excludes: &[], suffix_patterns: &[] },
        TypeNameRule { type_id: 4, patterns: &["动漫", "动画", "漫画"], excludes: &[], suffix_patterns: &[] },
        TypeNameRule { type_id: 6, patterns: &["体育", "竞技"], excludes: &[], suffix_patterns: &[] },
        TypeNameRule { type_id: 7, patterns: &["纪录"], excludes: &[], suffix_patterns: &[] },
    ];

    /// Content keywords searched in a video's synopsis/name when `type_name` doesn't match.
    pub const CONTENT_KEYWORDS: &[(&str, i16)] = &[
        ("纪录片", 7),
        ("季", 2),
        ("集", 2),
        ("演唱会", 3),
        ("脱口秀", 3),
        ("比赛", 6),
        ("世界杯", 6),
        ("联赛", 6),
    ];

    /// Known adult-content actor/director names, a last-resort signal before falling
    /// back to the video name or default.
    pub const ADULT_PEOPLE: &[&str] = &["三上悠亜", "波多野结衣", "明日花绮罗"];
}

/// Stateful classifier: wraps the repository + cache, hard-coded rules are stateless.
pub struct Classifier {
    repository: Arc<ClassifierRepository>,
    cache: Arc<CacheManager>,
}

impl Classifier {
    #[must_use]
    pub fn new(repository: Arc<ClassifierRepository>, cache: Arc<CacheManager>) -> Self {
        Self { repository, cache }
    }

    /// Drop every cached category mapping, forcing the next lookup to re-query the DB.
    pub fn clear_mapping_cache(&self) {
        self.cache.clear_mapping_cache();
    }

    /// Classify a single incoming video using the §4.C priority ladder.
    pub async fn auto_classify(
        &self,
        source_id: &str,
        upstream_type_id: Option<i32>,
        upstream_type_name: Option<&str>,
        video: &IncomingVideo,
    ) -> Result<ClassifyResult> {
        // 1. type_name pattern match
        if let Some(name) = upstream_type_name {
            if let Some(type_id) = Self::match_type_name(name) {
                let mut result = Self::result(type_id, 0.95, ClassifyMethod::TypeName);
                self.attach_sub_category(&mut result, name).await?;
                return Ok(result);
            }
        }

        // 2. content keyword match (synopsis + name)
        let haystack = format!("{} {}", video.name, video.synopsis);
        if let Some(type_id) = Self::match_content_keywords(&haystack) {
            let mut result = Self::result(type_id, 0.8, ClassifyMethod::ContentKeyword);
            self.attach_sub_category(&mut result, &haystack).await?;
            return Ok(result);
        }

        // 3. DB-backed type_id mapping (cached 5 minutes), falling back to ID-range heuristic
        if let Some(upstream_id) = upstream_type_id {
            if let Some(type_id) = self.lookup_type_id_mapping(source_id, upstream_id).await? {
                return Ok(Self::result(type_id, 0.85, ClassifyMethod::TypeId));
            }
            if let Some(type_id) = Self::id_range_heuristic(upstream_id) {
                return Ok(Self::result(type_id, 0.6, ClassifyMethod::TypeId));
            }
        }

        // 4. actor/director roster match
        if video
            .actors
            .iter()
            .chain(video.directors.iter())
            .any(|p| rules::ADULT_PEOPLE.contains(&p.as_str()))
        {
            return Ok(Self::result(9, 0.75, ClassifyMethod::ActorDirector));
        }

        // 5. video name match (reuse the content-keyword table against the name alone)
        if let Some(type_id) = Self::match_content_keywords(&video.name) {
            return Ok(Self::result(type_id, 0.55, ClassifyMethod::VideoName));
        }

        // 6. default
        Ok(Self::result(1, 0.4, ClassifyMethod::Default))
    }

    fn match_type_name(name: &str) -> Option<i16> {
        rules::TYPE_NAME_RULES
            .iter()
            .find(|rule| {
                let matched = rule.patterns.iter().any(|p| name.contains(p))
                    || rule.suffix_patterns.iter().any(|s| name.ends_with(s));
                matched && !rule.excludes.iter().any(|ex| name.contains(ex))
            })
            .map(|rule| rule.type_id)
    }

    fn match_content_keywords(text: &str) -> Option<i16> {
        rules::CONTENT_KEYWORDS
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, type_id)| *type_id)
    }

    /// Crude upstream `type_id` banding, used only when no DB mapping exists: the
    /// MacCMS-dialect `type_id` space clusters movies at 6-12, TV at 13-19, variety at
    /// 20-23, anime at 24-29, and short drama at 30-40 (§4.C).
    fn id_range_heuristic(upstream_id: i32) -> Option<i16> {
        match upstream_id {
            6..=12 => Some(1),
            13..=19 => Some(2),
            20..=23 => Some(3),
            24..=29 => Some(4),
            30..=40 => Some(5),
            _ => None,
        }
    }

    async fn lookup_type_id_mapping(&self, source_id: &str, upstream_id: i32) -> Result<Option<i16>> {
        let cache_key = format!("{source_id}:{upstream_id}");
        if let Some(cached) = self.cache.get_mapping::<i16>(&cache_key).await {
            return Ok(Some(cached));
        }

        let mappings = self.repository.list_category_mappings().await?;
        let found = mappings
            .into_iter()
            .find(|m| m.source_family == source_id && m.upstream_type_id == upstream_id)
            .map(|m| m.internal_type_id);

        if let Some(type_id) = found {
            self.cache.put_mapping(cache_key, &type_id).await?;
        }
        Ok(found)
    }

    /// §4.C sub-category resolution: scan `haystack` for a DB-loaded sub-category name
    /// under the chosen parent type, cached alongside the category mappings.
    async fn attach_sub_category(&self, result: &mut ClassifyResult, haystack: &str) -> Result<()> {
        let parent = result.type_id.as_i16();
        let cache_key = format!("subcats:{parent}");
        let sub_categories: Vec<(i32, String)> = if let Some(cached) = self.cache.get_mapping(&cache_key).await {
            cached
        } else {
            let loaded: Vec<(i32, String)> = self
                .repository
                .list_sub_categories(parent)
                .await?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect();
            self.cache.put_mapping(cache_key, &loaded).await?;
            loaded
        };

        if let Some((id, name)) = sub_categories.into_iter().find(|(_, name)| haystack.contains(name.as_str())) {
            result.sub_type_id = Some(id);
            result.sub_type_name = Some(name);
        }
        Ok(())
    }

    fn result(type_id: i16, confidence: f64, method: ClassifyMethod) -> ClassifyResult {
        let resolved = TypeId::from_i16(type_id).unwrap_or(TypeId::Movie);
        ClassifyResult {
            type_id: resolved,
            type_name: resolved.name(),
            sub_type_id: None,
            sub_type_name: None,
            confidence,
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IncomingVideo {
        IncomingVideo {
            name: "禁闭岛".to_string(),
            synopsis: "一部剧情片".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_type_name_precedes_db_lookup() {
        // type_name pattern matches are resolved without touching the repository/cache.
        assert_eq!(Classifier::match_type_name("剧情电影"), Some(1));
        let _ = sample();
    }

    #[test]
    fn test_movie_genre_suffix_not_captured_by_tv_series() {
        // §8 scenario 4: "动作片" classifies as Movie via type_name, not TVSeries,
        // despite "片" appearing in both movie and drama vocabulary.
        assert_eq!(Classifier::match_type_name("动作片"), Some(1));
    }

    #[test]
    fn test_short_drama_precedes_tv_series() {
        assert_eq!(Classifier::match_type_name("霸总短剧"), Some(5));
    }

    #[test]
    fn test_trailer_and_adult_precede_movie() {
        assert_eq!(Classifier::match_type_name("预告片"), Some(8));
        assert_eq!(Classifier::match_type_name("福利写真"), Some(9));
    }

    #[test]
    fn test_id_range_heuristic() {
        assert_eq!(Classifier::id_range_heuristic(5), None);
        assert_eq!(Classifier::id_range_heuristic(8), Some(1));
        assert_eq!(Classifier::id_range_heuristic(15), Some(2));
        assert_eq!(Classifier::id_range_heuristic(21), Some(3));
        assert_eq!(Classifier::id_range_heuristic(27), Some(4));
        assert_eq!(Classifier::id_range_heuristic(35), Some(5));
        assert_eq!(Classifier::id_range_heuristic(1000), None);
    }

    #[test]
    fn test_match_content_keywords() {
        assert_eq!(Classifier::match_content_keywords("第一季"), Some(2));
        assert_eq!(Classifier::match_content_keywords("精彩世界杯集锦"), Some(6));
        assert_eq!(Classifier::match_content_keywords("未知内容"), None);
    }
}
