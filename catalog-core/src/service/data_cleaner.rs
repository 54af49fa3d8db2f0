//! Normalization of parsed upstream records into `IncomingVideo` candidates (§4.B).
//!
//! Parsing (`ResponseParser`) only splits the wire format into structured fields;
//! this module is where upstream inconsistency gets sanded down: HTML in synopses,
//! inconsistent area/actor delimiters, duplicate/empty play routes.

use std::collections::HashMap;

use crate::models::{Episode, IncomingVideo, PlayUrls};

use super::response_parser::ParsedVideo;

/// Stateless field-level cleaning for one parsed upstream video.
pub struct DataCleaner;

impl DataCleaner {
    /// Clean a single parsed record into an `IncomingVideo`, ready for classification
    /// and dedup-merge.
    #[must_use]
    pub fn clean(source_name: &str, parsed: &ParsedVideo) -> IncomingVideo {
        IncomingVideo {
            source_name: source_name.to_string(),
            name: parsed.name.trim().to_string(),
            year: Self::clean_year(&parsed.year),
            area: Self::normalize_area(&parsed.area),
            language: parsed.language.trim().to_string(),
            actors: Self::split_people(&parsed.actors_raw),
            directors: Self::split_people(&parsed.directors_raw),
            synopsis: Self::strip_html(&parsed.content_raw),
            tags: Vec::new(),
            cover_url: Self::clean_image_url(&parsed.pic),
            thumb_url: String::new(),
            remarks: parsed.remarks.trim().to_string(),
            rating: 0.0,
            type_id: None,
            sub_type_id: None,
            play_urls: Self::clean_play_urls(parsed),
        }
    }

    /// Strip a 4-digit year out of noisy upstream values like "2010年" or "2010-08-01".
    #[must_use]
    pub fn clean_year(raw: &str) -> String {
        let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() == 4 {
            digits
        } else {
            raw.chars()
                .collect::<Vec<_>>()
                .windows(4)
                .find(|w| w.iter().all(char::is_ascii_digit))
                .map(|w| w.iter().collect())
                .unwrap_or_default()
        }
    }

    /// Split a comma/slash/space-delimited list of names into a trimmed, deduped vector.
    #[must_use]
    pub fn split_people(raw: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        raw.split(|c| matches!(c, ',' | '，' | '/' | '、'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert((*s).to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Collapse the many upstream spellings of mainland/HK/TW/overseas areas to a
    /// small canonical set. Comma/"，"-separated composites ("大陆,香港") are normalized
    /// member-wise and de-duplicated, preserving first-seen order.
    #[must_use]
    pub fn normalize_area(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if !trimmed.contains(',') && !trimmed.contains('，') {
            return Self::normalize_area_single(trimmed);
        }

        let mut seen = std::collections::HashSet::new();
        let members: Vec<String> = trimmed
            .split(|c| matches!(c, ',' | '，'))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::normalize_area_single)
            .filter(|s| seen.insert(s.clone()))
            .collect();
        members.join(",")
    }

    fn normalize_area_single(raw: &str) -> String {
        match raw {
            "中国大陆" | "大陆" | "内地" | "国产" | "中国" => "中国大陆".to_string(),
            "中国香港" | "香港" | "港" => "中国香港".to_string(),
            "中国台湾" | "台湾" | "台" => "中国台湾".to_string(),
            "美国" | "USA" | "US" => "美国".to_string(),
            other => other.to_string(),
        }
    }

    /// Strip HTML tags from upstream synopsis fields via `ammonia`, leaving only text.
    #[must_use]
    pub fn strip_html(raw: &str) -> String {
        let clean = ammonia::Builder::empty().clean(raw).to_string();
        html_escape_decode(&clean).trim().to_string()
    }

    /// Scheme-upgrade only (§4.B): `http://` → `https://`, everything else passed
    /// through untouched. Unlike play URLs, a non-`http(s)` image URL is not discarded.
    #[must_use]
    pub fn clean_image_url(raw: &str) -> String {
        Self::upgrade_scheme(raw.trim())
    }

    /// Build the cleaned `PlayUrls` map from a parsed video's routes (§4.B): upgrade
    /// `http://` to `https://`, drop any URL that still isn't `http(s)://` after that,
    /// default an empty label to "第i集" by 1-based position, and dedup route names
    /// (last write wins, matching the observed upstream behavior of repeating a route
    /// across pagination).
    #[must_use]
    pub fn clean_play_urls(parsed: &ParsedVideo) -> PlayUrls {
        let mut map: PlayUrls = HashMap::new();
        for route in &parsed.routes {
            let episodes: Vec<Episode> = route
                .episodes
                .iter()
                .enumerate()
                .filter_map(|(i, e)| {
                    let url = Self::upgrade_scheme(e.url.trim());
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return None;
                    }
                    let label = if e.label.trim().is_empty() {
                        format!("第{}集", i + 1)
                    } else {
                        e.label.trim().to_string()
                    };
                    Some(Episode { label, url })
                })
                .collect();
            if !episodes.is_empty() {
                map.insert(route.name.trim().to_string(), episodes);
            }
        }
        map
    }

    /// `http://` → `https://`; any other scheme (or no scheme) passes through unchanged
    /// so the `http(s)://` filter above can reject it.
    #[must_use]
    pub fn upgrade_scheme(url: &str) -> String {
        if let Some(rest) = url.strip_prefix("http://") {
            format!("https://{rest}")
        } else {
            url.to_string()
        }
    }

    /// Scheme-upgrade only, for cover/thumb image URLs (§4.B `clean_image_url`).
    #[must_use]
    pub fn upgrade_image_scheme(url: &str) -> String {
        Self::upgrade_scheme(url.trim())
    }

    /// Union two cleaned play-URL maps (§4.B, §8 P2): on a route-name collision the
    /// **existing** (already-stored) side wins, since it is what other consumers have
    /// already observed and linked to.
    #[must_use]
    pub fn merge_cleaned(existing: &PlayUrls, incoming: &PlayUrls) -> PlayUrls {
        let mut merged = existing.clone();
        for (route, episodes) in incoming {
            merged.entry(route.clone()).or_insert_with(|| episodes.clone());
        }
        merged
    }
}

fn html_escape_decode(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_year_extracts_digits() {
        assert_eq!(DataCleaner::clean_year("2010"), "2010");
        assert_eq!(DataCleaner::clean_year("2010-08-01"), "2010");
        assert_eq!(DataCleaner::clean_year("未知"), "");
    }

    #[test]
    fn test_split_people_dedups_and_trims() {
        let people = DataCleaner::split_people("莱昂纳多, 马克·鲁法洛 /莱昂纳多");
        assert_eq!(people, vec!["莱昂纳多", "马克·鲁法洛"]);
    }

    #[test]
    fn test_normalize_area_canonicalizes() {
        assert_eq!(DataCleaner::normalize_area("大陆"), "中国大陆");
        assert_eq!(DataCleaner::normalize_area("内地"), "中国大陆");
        assert_eq!(DataCleaner::normalize_area("国产"), "中国大陆");
        assert_eq!(DataCleaner::normalize_area("港"), "中国香港");
        assert_eq!(DataCleaner::normalize_area("法国"), "法国");
    }

    #[test]
    fn test_normalize_area_composite_dedup() {
        assert_eq!(DataCleaner::normalize_area("大陆,内地,香港"), "中国大陆,中国香港");
    }

    #[test]
    fn test_clean_play_urls_upgrades_scheme_and_drops_non_http() {
        use crate::service::response_parser::{ParsedRoute, ParsedVideo};
        let parsed = ParsedVideo {
            routes: vec![ParsedRoute {
                name: "m3u8".into(),
                episodes: vec![
                    Episode { label: String::new(), url: "http://a.com/1.m3u8".into() },
                    Episode { label: "第2集".into(), url: "ftp://a.com/2.m3u8".into() },
                ],
            }],
            ..Default::default()
        };
        let map = DataCleaner::clean_play_urls(&parsed);
        let episodes = &map["m3u8"];
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].url, "https://a.com/1.m3u8");
        assert_eq!(episodes[0].label, "第1集");
    }

    #[test]
    fn test_strip_html_removes_tags() {
        assert_eq!(DataCleaner::strip_html("<p>synopsis &amp; more</p>"), "synopsis & more");
    }

    #[test]
    fn test_clean_image_url_upgrades_scheme_only() {
        assert_eq!(DataCleaner::clean_image_url("http://x.com/a.jpg"), "https://x.com/a.jpg");
        assert_eq!(DataCleaner::clean_image_url("https://x.com/a.jpg"), "https://x.com/a.jpg");
    }

    #[test]
    fn test_clean_play_urls_drops_empty_episodes() {
        use crate::service::response_parser::{ParsedRoute, ParsedVideo};
        let parsed = ParsedVideo {
            routes: vec![ParsedRoute {
                name: "m3u8".into(),
                episodes: vec![
                    Episode { label: "第1集".into(), url: "https://x.com/1.m3u8".into() },
                    Episode { label: String::new(), url: String::new() },
                ],
            }],
            ..Default::default()
        };
        let map = DataCleaner::clean_play_urls(&parsed);
        assert_eq!(map.get("m3u8").unwrap().len(), 1);
    }

    #[test]
    fn test_merge_cleaned_prefers_existing_on_collision() {
        let mut existing: PlayUrls = HashMap::new();
        existing.insert("m3u8".to_string(), vec![Episode { label: "1".into(), url: "old".into() }]);
        let mut incoming: PlayUrls = HashMap::new();
        incoming.insert("m3u8".to_string(), vec![Episode { label: "1".into(), url: "new".into() }]);
        incoming.insert("hd2".to_string(), vec![Episode { label: "1".into(), url: "https://b.com/1".into() }]);
        let merged = DataCleaner::merge_cleaned(&existing, &incoming);
        assert_eq!(merged["m3u8"][0].url, "old");
        assert_eq!(merged["hd2"][0].url, "https://b.com/1");
    }
}
