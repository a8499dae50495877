//! # Document store
//!
//! MongoDB collection `items`, one document per catalogued movie or
//! show with the user ratings embedded. Deleting an item drops its
//! ratings with it; there is no second collection to keep in sync.
//!
//! Rating mutations are read-modify-write cycles guarded by a version
//! token: the update matches on `{_id, version}` and increments the
//! version, so a concurrent writer shows up as `matched_count == 0`
//! and the cycle re-reads instead of silently dropping the other
//! writer's contribution to the aggregate.

use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{self, doc},
};

use crate::{
    error::AppError,
    mapping::{self, StoredItem, StoredUserRating},
    model::{CreateItem, Item, UpdateItem, UserRating},
    rating,
};

const ITEMS_COLLECTION: &str = "items";

/// Attempts per compare-and-swap write before giving up.
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub async fn init_mongo(mongo_url: &str, mongo_db: &str) -> ItemRepository {
    let client = Client::with_uri_str(mongo_url)
        .await
        .expect("MongoDB misconfigured!");

    ItemRepository {
        items: client.database(mongo_db).collection(ITEMS_COLLECTION),
    }
}

#[derive(Clone)]
pub struct ItemRepository {
    items: Collection<StoredItem>,
}

impl ItemRepository {
    /// All items owned by one user, newest first.
    pub async fn find_by_owner(&self, owner: &str) -> Result<Vec<Item>, AppError> {
        let mut cursor = self
            .items
            .find(doc! { "user": owner })
            .sort(doc! { "createdAt": -1 })
            .await?;

        let mut found = Vec::new();
        while let Some(stored) = cursor.try_next().await? {
            found.push(mapping::item_from_stored(stored));
        }

        Ok(found)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Item, AppError> {
        let oid = mapping::parse_id(id)?;

        let stored = self
            .items
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(mapping::item_from_stored(stored))
    }

    /// New items start with an empty rating list and a zero aggregate.
    pub async fn create(&self, owner: &str, draft: &CreateItem) -> Result<String, AppError> {
        let now = Utc::now().to_rfc3339();

        let item = Item {
            id: String::new(),
            owner: owner.to_string(),
            title: draft.title.clone(),
            original_title: draft.original_title.clone(),
            year: draft.year.clone(),
            genre: draft.genre.clone(),
            runtime: draft.runtime.clone(),
            synopsis: draft.synopsis.clone(),
            poster: draft.poster.clone(),
            imdb_rating: draft.imdb_rating.clone(),
            imdb_votes: draft.imdb_votes.clone(),
            metascore: draft.metascore.clone(),
            external_ratings: draft.external_ratings.clone(),
            user_ratings: Vec::new(),
            average_rating: 0.0,
            watched: draft.watched,
            created_at: now.clone(),
            updated_at: now,
        };

        let stored = mapping::item_to_stored(&item)?;

        let inserted = self.items.insert_one(&stored).await?;
        let id = inserted
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .unwrap_or_default();

        Ok(id)
    }

    pub async fn update(&self, id: &str, patch: &UpdateItem) -> Result<(), AppError> {
        let oid = mapping::parse_id(id)?;

        let mut set = mapping::update_to_document(patch)?;
        set.insert("updatedAt", Utc::now().to_rfc3339());

        let result = self
            .items
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": set, "$inc": { "version": 1_i64 } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let oid = mapping::parse_id(id)?;

        let result = self.items.delete_one(doc! { "_id": oid }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// Adds or overwrites the caller's rating and persists the
    /// recomputed aggregate in the same write. Returns the updated item
    /// so the caller can invalidate the owner's caches.
    pub async fn upsert_rating(
        &self,
        id: &str,
        identity: &str,
        display_name: &str,
        score: f64,
        comment: Option<String>,
    ) -> Result<Item, AppError> {
        let (item, _) = self
            .mutate_ratings(id, |ratings, item_watched| {
                rating::upsert(
                    ratings,
                    identity,
                    display_name,
                    score,
                    item_watched,
                    comment.clone(),
                );
                true
            })
            .await?;

        Ok(item)
    }

    /// Removes the caller's rating, if present, with the same aggregate
    /// recompute and write path as an upsert. The flag reports whether
    /// an entry was actually removed; a miss leaves the document (and
    /// its version) untouched.
    pub async fn remove_rating(&self, id: &str, identity: &str) -> Result<(Item, bool), AppError> {
        self.mutate_ratings(id, |ratings, _| rating::remove(ratings, identity))
            .await
    }

    /// Compare-and-swap cycle shared by both rating mutations: load,
    /// apply, recompute the aggregate, write back filtered on the
    /// version read. When `apply` reports no change the write is
    /// skipped entirely.
    async fn mutate_ratings<F>(&self, id: &str, mut apply: F) -> Result<(Item, bool), AppError>
    where
        F: FnMut(&mut Vec<UserRating>, bool) -> bool,
    {
        let oid = mapping::parse_id(id)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self
                .items
                .find_one(doc! { "_id": oid })
                .await?
                .ok_or(AppError::NotFound)?;
            let version = stored.version;

            let mut item = mapping::item_from_stored(stored);
            if !apply(&mut item.user_ratings, item.watched) {
                return Ok((item, false));
            }
            item.average_rating = rating::average(&item.user_ratings);
            item.updated_at = Utc::now().to_rfc3339();

            let stored_ratings: Vec<StoredUserRating> =
                item.user_ratings.iter().map(mapping::rating_to_stored).collect();

            let result = self
                .items
                .update_one(
                    doc! { "_id": oid, "version": version },
                    doc! {
                        "$set": {
                            "userRatings": bson::to_bson(&stored_ratings)?,
                            "averageRating": item.average_rating,
                            "updatedAt": item.updated_at.as_str(),
                        },
                        "$inc": { "version": 1_i64 },
                    },
                )
                .await?;

            if result.matched_count == 1 {
                return Ok((item, true));
            }
            // Someone else wrote between our read and write; reload.
        }

        Err(AppError::WriteConflict)
    }
}
