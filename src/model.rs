use serde::{Deserialize, Serialize};

/// One rating source from an external provider, e.g.
/// `{"source": "Rotten Tomatoes", "value": "94%"}`. The value is an
/// opaque display string, no semantics imposed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalRating {
    pub source: String,
    pub value: String,
}

/// One authenticated user's rating of an item. `identity` is the stable
/// key (email); at most one entry per identity per item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    pub identity: String,
    pub display_name: String,
    pub score: f64,
    /// Snapshot of the item's watched flag at the time the rating was
    /// first written, not re-derived on later reads.
    pub watched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A cataloged movie or show, owned by exactly one user. Descriptive
/// fields are opaque strings filled from the metadata providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub genre: String,
    pub runtime: String,
    pub synopsis: String,
    pub poster: String,
    pub imdb_rating: String,
    pub imdb_votes: String,
    pub metascore: String,
    pub external_ratings: Vec<ExternalRating>,
    pub user_ratings: Vec<UserRating>,
    pub average_rating: f64,
    pub watched: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Creation payload. Identity of the owner comes from the token, never
/// from the body.
#[derive(Debug, Deserialize)]
pub struct CreateItem {
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub year: String,
    pub genre: String,
    pub runtime: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub imdb_rating: String,
    #[serde(default)]
    pub imdb_votes: String,
    #[serde(default)]
    pub metascore: String,
    #[serde(default)]
    pub external_ratings: Vec<ExternalRating>,
    #[serde(default)]
    pub watched: bool,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub runtime: Option<String>,
    pub synopsis: Option<String>,
    pub poster: Option<String>,
    pub imdb_rating: Option<String>,
    pub imdb_votes: Option<String>,
    pub metascore: Option<String>,
    pub external_ratings: Option<Vec<ExternalRating>>,
    pub watched: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RateItem {
    pub score: f64,
    pub comment: Option<String>,
}

/// Caller identity resolved from a bearer token by the external
/// identity provider.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub identity: String,
    pub display_name: String,
}

/// One candidate from a title search against the metadata provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub provider_id: i64,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub synopsis: String,
    pub poster: String,
}

/// Detail record merged from both providers, shaped so the client can
/// turn it into a `CreateItem` directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub provider_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub genre: String,
    pub runtime: String,
    pub synopsis: String,
    pub poster: String,
    pub imdb_rating: String,
    pub imdb_votes: String,
    pub metascore: String,
    pub external_ratings: Vec<ExternalRating>,
}

/// External ratings bundle for one IMDB id. Defaults to "N/A" fields
/// when the provider is unavailable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingsBundle {
    pub imdb_rating: String,
    pub imdb_votes: String,
    pub metascore: String,
    pub external_ratings: Vec<ExternalRating>,
}

impl RatingsBundle {
    pub fn unavailable() -> Self {
        Self {
            imdb_rating: "N/A".to_string(),
            imdb_votes: "N/A".to_string(),
            metascore: "N/A".to_string(),
            external_ratings: Vec::new(),
        }
    }
}
