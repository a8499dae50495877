//! # Metadata providers
//!
//! Gateway to the two external movie databases: TMDB for title search
//! and detail records, OMDB for third-party rating sources. Responses
//! are cached per provider TTL and normalized into the item shape.
//!
//! Provider failures degrade instead of propagating: a search returns
//! an empty list, a detail lookup returns `None`, a ratings lookup
//! returns "N/A" defaults. Callers cannot distinguish "not found" from
//! "provider down", which is the intended contract for these routes.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::{
    cache::{Cache, OMDB_RATINGS_PREFIX, TMDB_MOVIE_PREFIX, TMDB_SEARCH_PREFIX},
    config::Config,
    error::AppError,
    model::{ExternalRating, MovieDetails, RatingsBundle, SearchResult},
};

pub const TMDB_SEARCH_URL: &str = "https://api.themoviedb.org/3/search/movie";
pub const TMDB_MOVIE_URL: &str = "https://api.themoviedb.org/3/movie";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const OMDB_URL: &str = "https://www.omdbapi.com/";

const SEARCH_RESULT_LIMIT: usize = 10;

#[derive(Deserialize)]
struct TmdbSearchResponse {
    results: Vec<TmdbMovie>,
}

#[derive(Deserialize)]
struct TmdbMovie {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_title: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    poster_path: Option<String>,
}

#[derive(Deserialize)]
struct TmdbMovieDetails {
    id: i64,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_title: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    runtime: Option<i64>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    poster_path: Option<String>,
}

#[derive(Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "imdbRating", default)]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes", default)]
    imdb_votes: Option<String>,
    #[serde(rename = "Metascore", default)]
    metascore: Option<String>,
    #[serde(rename = "Ratings", default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Deserialize)]
struct OmdbRating {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}

pub struct MetadataClient {
    http: Client,
    tmdb_api_key: String,
    omdb_api_key: String,
    ttl_tmdb: u64,
    ttl_omdb: u64,
}

impl MetadataClient {
    pub fn new(config: &Config) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .build()
            .expect("HTTP client misconfigured!");

        Self {
            http,
            tmdb_api_key: config.tmdb_api_key.clone(),
            omdb_api_key: config.omdb_api_key.clone(),
            ttl_tmdb: config.cache_ttl_tmdb,
            ttl_omdb: config.cache_ttl_omdb,
        }
    }

    /// Title search against TMDB, at most [`SEARCH_RESULT_LIMIT`]
    /// candidates. Empty on provider failure.
    pub async fn search_title(&self, cache: &Cache, title: &str, lang: &str) -> Vec<SearchResult> {
        let key = format!("{TMDB_SEARCH_PREFIX}{}", title.to_lowercase());

        if let Some(cached) = cache.get(&key).await {
            if let Ok(results) = serde_json::from_str(&cached) {
                return results;
            }
        }

        let results = match self.fetch_tmdb_search(title, lang).await {
            Ok(results) => results,
            Err(e) => {
                warn!("TMDB search for {title:?} failed: {e}");
                return Vec::new();
            }
        };

        if let Ok(serialized) = serde_json::to_string(&results) {
            cache.set(&key, &serialized, self.ttl_tmdb).await;
        }

        results
    }

    /// Detail lookup by TMDB id, merged with the OMDB ratings bundle
    /// when the record carries an IMDB id. `None` covers both "no such
    /// movie" and "provider unavailable".
    pub async fn movie_details(
        &self,
        cache: &Cache,
        tmdb_id: i64,
        lang: &str,
    ) -> Option<MovieDetails> {
        let key = format!("{TMDB_MOVIE_PREFIX}{tmdb_id}_{lang}");

        if let Some(cached) = cache.get(&key).await {
            if let Ok(details) = serde_json::from_str(&cached) {
                return Some(details);
            }
        }

        let tmdb = match self.fetch_tmdb_details(tmdb_id, lang).await {
            Ok(details) => details,
            Err(e) => {
                warn!("TMDB details for {tmdb_id} failed: {e}");
                return None;
            }
        };

        let ratings = match &tmdb.imdb_id {
            Some(imdb_id) if !imdb_id.is_empty() => self.external_ratings(cache, imdb_id).await,
            _ => RatingsBundle::unavailable(),
        };

        let details = merge_details(tmdb, ratings);

        if let Ok(serialized) = serde_json::to_string(&details) {
            cache.set(&key, &serialized, self.ttl_tmdb).await;
        }

        Some(details)
    }

    /// OMDB ratings bundle for one IMDB id, "N/A" defaults on failure.
    pub async fn external_ratings(&self, cache: &Cache, imdb_id: &str) -> RatingsBundle {
        let key = format!("{OMDB_RATINGS_PREFIX}{imdb_id}");

        if let Some(cached) = cache.get(&key).await {
            if let Ok(bundle) = serde_json::from_str(&cached) {
                return bundle;
            }
        }

        let bundle = match self.fetch_omdb_ratings(imdb_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("OMDB ratings for {imdb_id} failed: {e}");
                return RatingsBundle::unavailable();
            }
        };

        if let Ok(serialized) = serde_json::to_string(&bundle) {
            cache.set(&key, &serialized, self.ttl_omdb).await;
        }

        bundle
    }

    async fn fetch_tmdb_search(&self, title: &str, lang: &str) -> Result<Vec<SearchResult>, AppError> {
        let response = self
            .http
            .get(TMDB_SEARCH_URL)
            .bearer_auth(&self.tmdb_api_key)
            .query(&[
                ("query", title),
                ("language", lang),
                ("include_adult", "false"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|_| AppError::UpstreamUnavailable)?;

        let body: TmdbSearchResponse = response
            .json()
            .await
            .map_err(|_| AppError::UpstreamUnavailable)?;

        Ok(body
            .results
            .into_iter()
            .take(SEARCH_RESULT_LIMIT)
            .map(search_result_from_tmdb)
            .collect())
    }

    async fn fetch_tmdb_details(&self, tmdb_id: i64, lang: &str) -> Result<TmdbMovieDetails, AppError> {
        let response = self
            .http
            .get(format!("{TMDB_MOVIE_URL}/{tmdb_id}"))
            .bearer_auth(&self.tmdb_api_key)
            .query(&[("language", lang)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|_| AppError::UpstreamUnavailable)?;

        response.json().await.map_err(|_| AppError::UpstreamUnavailable)
    }

    async fn fetch_omdb_ratings(&self, imdb_id: &str) -> Result<RatingsBundle, AppError> {
        let response = self
            .http
            .get(OMDB_URL)
            .query(&[("apikey", self.omdb_api_key.as_str()), ("i", imdb_id)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|_| AppError::UpstreamUnavailable)?;

        let body: OmdbResponse = response
            .json()
            .await
            .map_err(|_| AppError::UpstreamUnavailable)?;

        if body.response != "True" {
            return Err(AppError::UpstreamUnavailable);
        }

        Ok(bundle_from_omdb(body))
    }
}

fn search_result_from_tmdb(movie: TmdbMovie) -> SearchResult {
    SearchResult {
        provider_id: movie.id,
        title: movie.title,
        original_title: movie.original_title,
        year: year_of(&movie.release_date),
        synopsis: movie.overview,
        poster: poster_url(movie.poster_path.as_deref()),
    }
}

fn merge_details(tmdb: TmdbMovieDetails, ratings: RatingsBundle) -> MovieDetails {
    MovieDetails {
        provider_id: tmdb.id,
        imdb_id: tmdb.imdb_id,
        title: tmdb.title,
        original_title: tmdb.original_title,
        year: year_of(&tmdb.release_date),
        genre: tmdb
            .genres
            .into_iter()
            .map(|g| g.name)
            .collect::<Vec<_>>()
            .join(", "),
        runtime: tmdb
            .runtime
            .filter(|minutes| *minutes > 0)
            .map(|minutes| format!("{minutes} min"))
            .unwrap_or_default(),
        synopsis: tmdb.overview,
        poster: poster_url(tmdb.poster_path.as_deref()),
        imdb_rating: ratings.imdb_rating,
        imdb_votes: ratings.imdb_votes,
        metascore: ratings.metascore,
        external_ratings: ratings.external_ratings,
    }
}

fn bundle_from_omdb(body: OmdbResponse) -> RatingsBundle {
    RatingsBundle {
        imdb_rating: or_na(body.imdb_rating),
        imdb_votes: or_na(body.imdb_votes),
        metascore: or_na(body.metascore),
        external_ratings: body
            .ratings
            .into_iter()
            .map(|r| ExternalRating {
                source: r.source,
                value: r.value,
            })
            .collect(),
    }
}

fn or_na(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A".to_string(),
    }
}

/// Release dates come as `YYYY-MM-DD`; only the year is kept.
fn year_of(release_date: &str) -> String {
    release_date.chars().take(4).collect()
}

fn poster_url(poster_path: Option<&str>) -> String {
    match poster_path {
        Some(path) if !path.is_empty() => format!("{TMDB_IMAGE_BASE}{path}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TMDB_SEARCH_FIXTURE: &str = r#"{
        "page": 1,
        "results": [
            {
                "id": 949,
                "title": "Heat",
                "original_title": "Heat",
                "release_date": "1995-12-15",
                "overview": "Obsessive master thief Neil McCauley...",
                "poster_path": "/umSVjVdbVwtx5ryCA2QXL44Durm.jpg",
                "vote_average": 7.9
            },
            {
                "id": 10647,
                "title": "Heat",
                "original_title": "Heat",
                "release_date": "",
                "overview": "",
                "poster_path": null
            }
        ],
        "total_pages": 1,
        "total_results": 2
    }"#;

    const TMDB_DETAILS_FIXTURE: &str = r#"{
        "id": 949,
        "imdb_id": "tt0113277",
        "title": "Heat",
        "original_title": "Heat",
        "release_date": "1995-12-15",
        "runtime": 170,
        "genres": [{"id": 28, "name": "Action"}, {"id": 80, "name": "Crime"}],
        "overview": "Obsessive master thief Neil McCauley...",
        "poster_path": "/umSVjVdbVwtx5ryCA2QXL44Durm.jpg"
    }"#;

    const OMDB_FIXTURE: &str = r#"{
        "Title": "Heat",
        "imdbRating": "8.3",
        "imdbVotes": "750,278",
        "Metascore": "76",
        "Ratings": [
            {"Source": "Internet Movie Database", "Value": "8.3/10"},
            {"Source": "Rotten Tomatoes", "Value": "94%"}
        ],
        "Response": "True"
    }"#;

    #[test]
    fn test_search_response_normalization() {
        let body: TmdbSearchResponse = serde_json::from_str(TMDB_SEARCH_FIXTURE).unwrap();
        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .map(search_result_from_tmdb)
            .collect();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provider_id, 949);
        assert_eq!(results[0].year, "1995");
        assert_eq!(
            results[0].poster,
            "https://image.tmdb.org/t/p/w500/umSVjVdbVwtx5ryCA2QXL44Durm.jpg"
        );
        assert_eq!(results[1].year, "");
        assert_eq!(results[1].poster, "");
    }

    #[test]
    fn test_details_merge() {
        let tmdb: TmdbMovieDetails = serde_json::from_str(TMDB_DETAILS_FIXTURE).unwrap();
        let omdb: OmdbResponse = serde_json::from_str(OMDB_FIXTURE).unwrap();

        let details = merge_details(tmdb, bundle_from_omdb(omdb));

        assert_eq!(details.imdb_id.as_deref(), Some("tt0113277"));
        assert_eq!(details.year, "1995");
        assert_eq!(details.genre, "Action, Crime");
        assert_eq!(details.runtime, "170 min");
        assert_eq!(details.imdb_rating, "8.3");
        assert_eq!(details.metascore, "76");
        assert_eq!(details.external_ratings.len(), 2);
        assert_eq!(details.external_ratings[1].value, "94%");
    }

    #[test]
    fn test_details_merge_without_omdb() {
        let tmdb: TmdbMovieDetails = serde_json::from_str(TMDB_DETAILS_FIXTURE).unwrap();

        let details = merge_details(tmdb, RatingsBundle::unavailable());

        assert_eq!(details.imdb_rating, "N/A");
        assert_eq!(details.metascore, "N/A");
        assert!(details.external_ratings.is_empty());
    }

    #[test]
    fn test_omdb_missing_fields_default_to_na() {
        let body: OmdbResponse =
            serde_json::from_str(r#"{"Response": "True", "Metascore": ""}"#).unwrap();
        let bundle = bundle_from_omdb(body);

        assert_eq!(bundle.imdb_rating, "N/A");
        assert_eq!(bundle.metascore, "N/A");
        assert!(bundle.external_ratings.is_empty());
    }

    #[test]
    fn test_omdb_not_found_flag() {
        let body: OmdbResponse =
            serde_json::from_str(r#"{"Response": "False", "Error": "Movie not found!"}"#).unwrap();

        assert_eq!(body.response, "False");
    }
}
