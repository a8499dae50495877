//! Catalogue business logic: read-through caching, ownership checks,
//! creation validation, and the cache invalidation that keeps derived
//! aggregates from going stale in the UI.
//!
//! Every mutation clears exactly two keys: the item itself and the
//! owner's list. Other users' list caches are left alone; they only
//! ever contain their own items.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::warn;

use crate::{
    cache::{Cache, item_key, owner_list_key},
    db::ItemRepository,
    error::AppError,
    model::{CreateItem, Item, RateItem, UpdateItem},
    rating,
};

const MIN_YEAR: i32 = 1800;

pub struct ItemService {
    repo: ItemRepository,
    cache: Arc<Cache>,
    cache_ttl: u64,
}

impl ItemService {
    pub fn new(repo: ItemRepository, cache: Arc<Cache>, cache_ttl: u64) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<Item>, AppError> {
        let key = owner_list_key(owner);

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_str(&cached) {
                Ok(items) => return Ok(items),
                Err(e) => warn!("Discarding unreadable list cache entry for {owner}: {e}"),
            }
        }

        let items = self.repo.find_by_owner(owner).await?;

        if let Ok(serialized) = serde_json::to_string(&items) {
            self.cache.set(&key, &serialized, self.cache_ttl).await;
        }

        Ok(items)
    }

    /// Owner-only read. The ownership check applies to cache hits too,
    /// otherwise one user could read another's item out of the cache.
    pub async fn get(&self, id: &str, caller: &str) -> Result<Item, AppError> {
        let key = item_key(id);

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(item) = serde_json::from_str::<Item>(&cached) {
                if item.owner != caller {
                    return Err(AppError::NotOwner);
                }
                return Ok(item);
            }
        }

        let item = self.repo.find_by_id(id).await?;
        if item.owner != caller {
            return Err(AppError::NotOwner);
        }

        if let Ok(serialized) = serde_json::to_string(&item) {
            self.cache.set(&key, &serialized, self.cache_ttl).await;
        }

        Ok(item)
    }

    pub async fn create(&self, owner: &str, draft: &CreateItem) -> Result<String, AppError> {
        validate_draft(draft)?;

        let id = self.repo.create(owner, draft).await?;

        self.cache.delete(&owner_list_key(owner)).await;

        Ok(id)
    }

    pub async fn update(&self, id: &str, caller: &str, patch: &UpdateItem) -> Result<(), AppError> {
        // Existence and ownership first; the patch never moves an item
        // to another owner.
        self.get(id, caller).await?;

        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(AppError::InvalidItem("Title cannot be empty".to_string()));
            }
        }

        self.repo.update(id, patch).await?;
        self.invalidate(id, caller).await;

        Ok(())
    }

    pub async fn delete(&self, id: &str, caller: &str) -> Result<(), AppError> {
        self.get(id, caller).await?;

        self.repo.delete(id).await?;
        self.invalidate(id, caller).await;

        Ok(())
    }

    /// Any authenticated user may rate any item, not just its owner.
    pub async fn rate(
        &self,
        id: &str,
        identity: &str,
        display_name: &str,
        payload: &RateItem,
    ) -> Result<(), AppError> {
        rating::validate_score(payload.score)?;

        let item = self
            .repo
            .upsert_rating(id, identity, display_name, payload.score, payload.comment.clone())
            .await?;

        self.invalidate(id, &item.owner).await;

        Ok(())
    }

    pub async fn unrate(&self, id: &str, identity: &str) -> Result<(), AppError> {
        let (item, removed) = self.repo.remove_rating(id, identity).await?;

        // A caller with no rating on the item changed nothing; leave
        // the caches warm.
        if removed {
            self.invalidate(id, &item.owner).await;
        }

        Ok(())
    }

    /// Both derived cache entries for one item: the item itself and the
    /// owner's list. Missing either leaves a stale aggregate visible.
    async fn invalidate(&self, id: &str, owner: &str) {
        self.cache.delete(&item_key(id)).await;
        self.cache.delete(&owner_list_key(owner)).await;
    }
}

fn validate_draft(draft: &CreateItem) -> Result<(), AppError> {
    if draft.title.trim().is_empty() {
        return Err(AppError::InvalidItem("Title is required".to_string()));
    }
    if draft.runtime.trim().is_empty() {
        return Err(AppError::InvalidItem("Runtime is required".to_string()));
    }
    if draft.genre.trim().is_empty() {
        return Err(AppError::InvalidItem("Genre is required".to_string()));
    }
    if draft.year.trim().is_empty() {
        return Err(AppError::InvalidItem("Year is required".to_string()));
    }

    let max_year = Utc::now().year() + 5;
    match draft.year.trim().parse::<i32>() {
        Ok(year) if (MIN_YEAR..=max_year).contains(&year) => Ok(()),
        _ => Err(AppError::InvalidItem("Invalid year".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn draft(title: &str, year: &str) -> CreateItem {
        CreateItem {
            title: title.to_string(),
            original_title: String::new(),
            year: year.to_string(),
            genre: "Drama".to_string(),
            runtime: "120 min".to_string(),
            synopsis: String::new(),
            poster: String::new(),
            imdb_rating: String::new(),
            imdb_votes: String::new(),
            metascore: String::new(),
            external_ratings: Vec::new(),
            watched: false,
        }
    }

    #[test]
    fn test_draft_validation() {
        assert!(validate_draft(&draft("Heat", "1995")).is_ok());
        assert!(validate_draft(&draft("", "1995")).is_err());
        assert!(validate_draft(&draft("   ", "1995")).is_err());
        assert!(validate_draft(&draft("Heat", "")).is_err());
        assert!(validate_draft(&draft("Heat", "1700")).is_err());
        assert!(validate_draft(&draft("Heat", "not-a-year")).is_err());

        let far_future = (Utc::now().year() + 6).to_string();
        assert!(validate_draft(&draft("Heat", &far_future)).is_err());
        let near_future = (Utc::now().year() + 5).to_string();
        assert!(validate_draft(&draft("Heat", &near_future)).is_ok());
    }

    #[tokio::test]
    async fn test_mutation_clears_item_and_owner_list_keys() {
        // The driver connects lazily, so building the repository does
        // not require a running server.
        let repo = crate::db::init_mongo("mongodb://localhost:27017", "movielist_test").await;
        let cache = Arc::new(Cache::Memory(MemoryCache::new()));
        let service = ItemService::new(repo, cache.clone(), 300);

        cache.set(&item_key("it1"), "pre-mutation item", 300).await;
        cache
            .set(&owner_list_key("owner@x.com"), "pre-mutation list", 300)
            .await;
        cache
            .set(&owner_list_key("other@x.com"), "untouched", 300)
            .await;

        service.invalidate("it1", "owner@x.com").await;

        assert_eq!(cache.get(&item_key("it1")).await, None);
        assert_eq!(cache.get(&owner_list_key("owner@x.com")).await, None);
        // Exact-match invalidation only: other users' lists stay.
        assert_eq!(
            cache.get(&owner_list_key("other@x.com")).await.as_deref(),
            Some("untouched")
        );
    }
}
