use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::VideoId;

/// Fixed internal taxonomy (§6 of the catalog spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum TypeId {
    Movie = 1,
    TvSeries = 2,
    Variety = 3,
    Anime = 4,
    ShortDrama = 5,
    Sports = 6,
    Documentary = 7,
    Trailer = 8,
    Adult = 9,
}

impl TypeId {
    #[must_use]
    pub const fn from_i16(v: i16) -> Option<Self> {
        match v {
            1 => Some(Self::Movie),
            2 => Some(Self::TvSeries),
            3 => Some(Self::Variety),
            4 => Some(Self::Anime),
            5 => Some(Self::ShortDrama),
            6 => Some(Self::Sports),
            7 => Some(Self::Documentary),
            8 => Some(Self::Trailer),
            9 => Some(Self::Adult),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Movie => "电影",
            Self::TvSeries => "电视剧",
            Self::Variety => "综艺",
            Self::Anime => "动漫",
            Self::ShortDrama => "短剧",
            Self::Sports => "体育",
            Self::Documentary => "纪录片",
            Self::Trailer => "预告片",
            Self::Adult => "成人",
        }
    }
}

/// One playable episode within a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub label: String,
    pub url: String,
}

/// Cleaned play-URL map: upstream route name → ordered episode list.
pub type PlayUrls = HashMap<String, Vec<Episode>>;

/// An ordered, named view over `PlayUrls` for presentation (`to_play_sources`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaySource {
    pub name: String,
    pub episodes: Vec<Episode>,
}

/// How a video's taxonomy was decided (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyMethod {
    TypeName,
    ContentKeyword,
    TypeId,
    ActorDirector,
    VideoName,
    Default,
}

/// Result of `auto_classify` (§4.C), prior to being folded into a `Video`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub sub_type_id: Option<i32>,
    pub sub_type_name: Option<String>,
    pub confidence: f64,
    pub method: ClassifyMethod,
}

/// A catalog entry (§3 Video).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub name: String,
    pub year: String,
    pub area: String,
    pub language: String,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub synopsis: String,
    pub tags: Vec<String>,
    pub cover_url: String,
    pub thumb_url: String,
    pub remarks: String,
    pub rating: f64,
    pub type_id: i16,
    pub sub_type_id: Option<i32>,
    pub source_names: Vec<String>,
    pub source_priority: i32,
    pub quality_score: i32,
    pub is_valid: bool,
    pub play_urls: PlayUrls,
    pub preview_episode_index: Option<i32>,
    pub preview_url: Option<String>,
    pub shorts_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// First listed director, used for fingerprinting and merge matching.
    #[must_use]
    pub fn first_director(&self) -> Option<&str> {
        self.directors.first().map(String::as_str)
    }

    /// Does the play-URL map decode to at least one well-formed episode?
    #[must_use]
    pub fn has_playable_episode(&self) -> bool {
        self.play_urls.values().any(|eps| !eps.is_empty())
    }

    /// Recompute the §4.G completeness-based quality score from the current fields.
    #[must_use]
    pub fn compute_quality_score(&self) -> i32 {
        let has_cover = i32::from(!self.cover_url.is_empty());
        let has_actor = i32::from(!self.actors.is_empty());
        let has_director = i32::from(!self.directors.is_empty());
        let has_synopsis = i32::from(self.synopsis.chars().count() >= 20);
        let has_play_url = i32::from(
            self.play_urls
                .values()
                .any(|eps| eps.iter().any(|e| e.url.len() >= 10)),
        );

        20 * has_cover + 15 * has_actor + 10 * has_director + 25 * has_synopsis + 30 * has_play_url
    }

    /// `to_play_sources`: flatten the route map into a list (order not guaranteed).
    #[must_use]
    pub fn to_play_sources(&self) -> Vec<PlaySource> {
        self.play_urls
            .iter()
            .map(|(name, episodes)| PlaySource {
                name: name.clone(),
                episodes: episodes.clone(),
            })
            .collect()
    }
}

/// A freshly parsed/cleaned/classified candidate, prior to dedup-merge (§4.G input).
#[derive(Debug, Clone, Default)]
pub struct IncomingVideo {
    pub source_name: String,
    pub name: String,
    pub year: String,
    pub area: String,
    pub language: String,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub synopsis: String,
    pub tags: Vec<String>,
    pub cover_url: String,
    pub thumb_url: String,
    pub remarks: String,
    pub rating: f64,
    pub type_id: Option<i16>,
    pub sub_type_id: Option<i32>,
    pub play_urls: PlayUrls,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> Video {
        let now = Utc::now();
        Video {
            id: VideoId::from_fingerprint("禁闭岛|2010|美国|马丁·斯科塞斯"),
            name: "禁闭岛".into(),
            year: "2010".into(),
            area: "美国".into(),
            language: "原声".into(),
            actors: vec![],
            directors: vec!["马丁·斯科塞斯".into()],
            synopsis: String::new(),
            tags: vec![],
            cover_url: String::new(),
            thumb_url: String::new(),
            remarks: String::new(),
            rating: 0.0,
            type_id: TypeId::Movie.as_i16(),
            sub_type_id: None,
            source_names: vec!["A".into()],
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
    fn test_quality_score_director_only() {
        let v = sample_video();
        // has_director(10) only — matches scenario 1's partial expectation before play-urls added
        assert_eq!(v.compute_quality_score(), 10);
    }

    #[test]
    fn test_quality_score_with_playable_url() {
        let mut v = sample_video();
        v.play_urls.insert(
            "A".into(),
            vec![Episode {
                label: "第1集".into(),
                url: "https://a.com/1.m3u8".into(),
            }],
        );
        assert_eq!(v.compute_quality_score(), 10 + 30);
    }

    #[test]
    fn test_has_playable_episode() {
        let mut v = sample_video();
        assert!(!v.has_playable_episode());
        v.play_urls.insert("A".into(), vec![]);
        assert!(!v.has_playable_episode());
        v.play_urls.insert(
            "B".into(),
            vec![Episode {
                label: "第1集".into(),
                url: "https://a.com/1.m3u8".into(),
            }],
        );
        assert!(v.has_playable_episode());
    }
}
