//! Stored-document translation layer.
//!
//! The collection keeps the field names the original data was written
//! under (`user`, `userRatings`, `rating`, ...), while the application
//! works with the domain names in [`crate::model`]. Every read or write
//! crosses exactly one of the two functions below; nothing else in the
//! crate touches the stored scheme.

use mongodb::bson::{self, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    model::{ExternalRating, Item, UpdateItem, UserRating},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredExternalRating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredUserRating {
    /// Display name; the stable key is `email`.
    pub user: String,
    pub email: String,
    pub rating: f64,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub year: String,
    pub genre: String,
    pub duration: String,
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
    pub ratings: Vec<StoredExternalRating>,
    pub user: String,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub user_ratings: Vec<StoredUserRating>,
    #[serde(default)]
    pub average_rating: f64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// Optimistic concurrency token, bumped on every write.
    #[serde(default)]
    pub version: i64,
}

pub fn rating_to_stored(rating: &UserRating) -> StoredUserRating {
    StoredUserRating {
        user: rating.display_name.clone(),
        email: rating.identity.clone(),
        rating: rating.score,
        watched: rating.watched,
        comment: rating.comment.clone(),
    }
}

pub fn rating_from_stored(stored: StoredUserRating) -> UserRating {
    UserRating {
        identity: stored.email,
        display_name: stored.user,
        score: stored.rating,
        watched: stored.watched,
        comment: stored.comment,
    }
}

/// Builds the stored form of a document to insert. The concurrency
/// token starts at zero, so this is only correct for new documents;
/// existing ones are rewritten through the repository's versioned
/// `$set`/`$inc` updates, which never pass through here.
pub fn item_to_stored(item: &Item) -> Result<StoredItem, AppError> {
    let id = match item.id.is_empty() {
        true => None,
        false => Some(parse_id(&item.id)?),
    };

    Ok(StoredItem {
        id,
        title: item.title.clone(),
        original_title: item.original_title.clone(),
        year: item.year.clone(),
        genre: item.genre.clone(),
        duration: item.runtime.clone(),
        synopsis: item.synopsis.clone(),
        poster: item.poster.clone(),
        imdb_rating: item.imdb_rating.clone(),
        imdb_votes: item.imdb_votes.clone(),
        metascore: item.metascore.clone(),
        ratings: item
            .external_ratings
            .iter()
            .map(|r| StoredExternalRating {
                source: r.source.clone(),
                value: r.value.clone(),
            })
            .collect(),
        user: item.owner.clone(),
        watched: item.watched,
        user_ratings: item.user_ratings.iter().map(rating_to_stored).collect(),
        average_rating: item.average_rating,
        created_at: item.created_at.clone(),
        updated_at: item.updated_at.clone(),
        version: 0,
    })
}

pub fn item_from_stored(stored: StoredItem) -> Item {
    Item {
        id: stored.id.map(|oid| oid.to_hex()).unwrap_or_default(),
        owner: stored.user,
        title: stored.title,
        original_title: stored.original_title,
        year: stored.year,
        genre: stored.genre,
        runtime: stored.duration,
        synopsis: stored.synopsis,
        poster: stored.poster,
        imdb_rating: stored.imdb_rating,
        imdb_votes: stored.imdb_votes,
        metascore: stored.metascore,
        external_ratings: stored
            .ratings
            .into_iter()
            .map(|r| ExternalRating {
                source: r.source,
                value: r.value,
            })
            .collect(),
        user_ratings: stored
            .user_ratings
            .into_iter()
            .map(rating_from_stored)
            .collect(),
        average_rating: stored.average_rating,
        watched: stored.watched,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

/// Builds the `$set` document for a partial update; absent fields stay
/// untouched in storage.
pub fn update_to_document(patch: &UpdateItem) -> Result<Document, AppError> {
    let mut set = Document::new();

    if let Some(title) = &patch.title {
        set.insert("title", title);
    }
    if let Some(original_title) = &patch.original_title {
        set.insert("originalTitle", original_title);
    }
    if let Some(year) = &patch.year {
        set.insert("year", year);
    }
    if let Some(genre) = &patch.genre {
        set.insert("genre", genre);
    }
    if let Some(runtime) = &patch.runtime {
        set.insert("duration", runtime);
    }
    if let Some(synopsis) = &patch.synopsis {
        set.insert("synopsis", synopsis);
    }
    if let Some(poster) = &patch.poster {
        set.insert("poster", poster);
    }
    if let Some(imdb_rating) = &patch.imdb_rating {
        set.insert("imdbRating", imdb_rating);
    }
    if let Some(imdb_votes) = &patch.imdb_votes {
        set.insert("imdbVotes", imdb_votes);
    }
    if let Some(metascore) = &patch.metascore {
        set.insert("metascore", metascore);
    }
    if let Some(external_ratings) = &patch.external_ratings {
        let stored: Vec<StoredExternalRating> = external_ratings
            .iter()
            .map(|r| StoredExternalRating {
                source: r.source.clone(),
                value: r.value.clone(),
            })
            .collect();
        set.insert("ratings", bson::to_bson(&stored)?);
    }
    if let Some(watched) = &patch.watched {
        set.insert("watched", watched);
    }

    Ok(set)
}

/// Hex ids that do not parse cannot refer to any stored item.
pub fn parse_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    fn sample_item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            owner: "owner@x.com".to_string(),
            title: "Heat".to_string(),
            original_title: "Heat".to_string(),
            year: "1995".to_string(),
            genre: "Crime, Drama".to_string(),
            runtime: "170 min".to_string(),
            synopsis: "A heist crew and a detective circle each other.".to_string(),
            poster: "https://image.tmdb.org/t/p/w500/heat.jpg".to_string(),
            imdb_rating: "8.3".to_string(),
            imdb_votes: "750,000".to_string(),
            metascore: "76".to_string(),
            external_ratings: vec![ExternalRating {
                source: "Rotten Tomatoes".to_string(),
                value: "94%".to_string(),
            }],
            user_ratings: vec![UserRating {
                identity: "a@x.com".to_string(),
                display_name: "A".to_string(),
                score: 8.5,
                watched: true,
                comment: Some("rewatched twice".to_string()),
            }],
            average_rating: 8.5,
            watched: true,
            created_at: "2024-03-01T10:00:00+00:00".to_string(),
            updated_at: "2024-03-02T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let oid = ObjectId::new();
        let item = sample_item(&oid.to_hex());

        let stored = item_to_stored(&item).unwrap();
        let back = item_from_stored(stored);

        assert_eq!(back, item);
    }

    #[test]
    fn test_stored_scheme_field_names() {
        let oid = ObjectId::new();
        let stored = item_to_stored(&sample_item(&oid.to_hex())).unwrap();
        let doc = bson::to_document(&stored).unwrap();

        // Storage scheme, not the domain one.
        assert_eq!(doc.get_str("user").unwrap(), "owner@x.com");
        assert_eq!(doc.get_str("duration").unwrap(), "170 min");
        assert_eq!(doc.get_str("originalTitle").unwrap(), "Heat");
        assert_eq!(doc.get_str("imdbRating").unwrap(), "8.3");
        assert!(doc.contains_key("userRatings"));
        assert!(doc.contains_key("averageRating"));
        assert!(doc.contains_key("createdAt"));
        assert!(!doc.contains_key("owner"));
        assert!(!doc.contains_key("runtime"));

        let ratings = doc.get_array("ratings").unwrap();
        let first = ratings[0].as_document().unwrap();
        assert_eq!(first.get_str("Source").unwrap(), "Rotten Tomatoes");
        assert_eq!(first.get_str("Value").unwrap(), "94%");

        let user_ratings = doc.get_array("userRatings").unwrap();
        let first = user_ratings[0].as_document().unwrap();
        assert_eq!(first.get_str("email").unwrap(), "a@x.com");
        assert_eq!(first.get_str("user").unwrap(), "A");
        assert_eq!(first.get_f64("rating").unwrap(), 8.5);
    }

    #[test]
    fn test_new_item_serializes_without_id() {
        let item = sample_item("");
        let stored = item_to_stored(&item).unwrap();

        // Fresh inserts start the concurrency token at zero.
        assert_eq!(stored.version, 0);

        let doc = bson::to_document(&stored).unwrap();
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn test_legacy_rating_without_watched_flag() {
        // Documents written before the watched snapshot was stored.
        let stored: StoredUserRating = bson::from_document(doc! {
            "user": "A",
            "email": "a@x.com",
            "rating": 7.0,
        })
        .unwrap();

        let rating = rating_from_stored(stored);
        assert!(!rating.watched);
        assert_eq!(rating.comment, None);
    }

    #[test]
    fn test_update_document_covers_only_present_fields() {
        let patch = UpdateItem {
            title: Some("Heat (Director's Cut)".to_string()),
            watched: Some(true),
            ..Default::default()
        };

        let set = update_to_document(&patch).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("title").unwrap(), "Heat (Director's Cut)");
        assert!(set.get_bool("watched").unwrap());
    }

    #[test]
    fn test_update_document_full_patch() {
        let patch = UpdateItem {
            title: Some("t".into()),
            original_title: Some("ot".into()),
            year: Some("2001".into()),
            genre: Some("g".into()),
            runtime: Some("100 min".into()),
            synopsis: Some("s".into()),
            poster: Some("p".into()),
            imdb_rating: Some("7.0".into()),
            imdb_votes: Some("1".into()),
            metascore: Some("50".into()),
            external_ratings: Some(vec![ExternalRating {
                source: "IMDB".into(),
                value: "7.0/10".into(),
            }]),
            watched: Some(false),
        };

        let set = update_to_document(&patch).unwrap();

        for key in [
            "title",
            "originalTitle",
            "year",
            "genre",
            "duration",
            "synopsis",
            "poster",
            "imdbRating",
            "imdbVotes",
            "metascore",
            "ratings",
            "watched",
        ] {
            assert!(set.contains_key(key), "missing {key}");
        }
        assert_eq!(set.len(), 12);
    }

    #[test]
    fn test_bad_hex_id_is_not_found() {
        assert!(matches!(parse_id("not-an-oid"), Err(AppError::NotFound)));
    }
}
