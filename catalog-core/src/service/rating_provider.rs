//! TMDB-backed implementation of `RatingProvider` (§4.I: "mirror score onto the video
//! row with source = `tmdb`").
//!
//! Searches TMDB's multi-search endpoint with the cleaned title, keeps the top result
//! whose release year (movie) or first-air-date year (TV) is within ±1 year of the
//! title's own year when one was supplied, and maps `vote_average`/`vote_count` onto
//! the `(score, votes, external_id)` triple `RatingEnricher` persists.

use std::time::Duration;

use serde::Deserialize;

use crate::models::VideoId;
use crate::service::rating_enricher::RatingProvider;

const YEAR_TOLERANCE: i32 = 1;

pub struct TmdbRatingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TmdbRatingProvider {
    #[must_use]
    pub fn new(base_url: String, api_key: String, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
        }
    }

    fn result_year(result: &TmdbResult) -> Option<i32> {
        result
            .release_date
            .as_deref()
            .or(result.first_air_date.as_deref())
            .and_then(|date| date.get(0..4))
            .and_then(|y| y.parse().ok())
    }

    fn within_tolerance(result_year: Option<i32>, expected_year: &str) -> bool {
        let Ok(expected) = expected_year.parse::<i32>() else {
            return true;
        };
        match result_year {
            Some(year) => (year - expected).abs() <= YEAR_TOLERANCE,
            None => true,
        }
    }
}

#[async_trait::async_trait]
impl RatingProvider for TmdbRatingProvider {
    async fn lookup(&self, _video_id: &VideoId, name: &str, year: &str) -> std::result::Result<(f64, i64, String), String> {
        let url = format!("{}/search/multi", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("query", name), ("include_adult", "true")])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("TMDB search failed: HTTP {}", response.status()));
        }

        let body: TmdbSearchResponse = response.json().await.map_err(|e| e.to_string())?;
        let within_window = body.results.iter().position(|r| Self::within_tolerance(Self::result_year(r), year));
        let chosen_index = if year.is_empty() { 0 } else { within_window.unwrap_or(0) };

        let chosen = body
            .results
            .into_iter()
            .nth(chosen_index)
            .ok_or_else(|| "no matching TMDB result".to_string())?;

        Ok((chosen.vote_average, chosen.vote_count, chosen.id.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    results: Vec<TmdbResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbResult {
    id: i64,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: i64,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
}
