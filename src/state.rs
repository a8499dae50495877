use std::sync::Arc;

use crate::{
    auth::IdentityVerifier,
    cache::Cache,
    config::Config,
    db::init_mongo,
    items::ItemService,
    metadata::MetadataClient,
};

pub struct AppState {
    pub config: Config,
    pub cache: Arc<Cache>,
    pub items: ItemService,
    pub metadata: MetadataClient,
    pub verifier: IdentityVerifier,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let cache = Arc::new(Cache::connect(&config.cache_backend, &config.redis_url).await);
        let repo = init_mongo(&config.mongo_url, &config.mongo_db).await;

        let items = ItemService::new(repo, cache.clone(), config.cache_ttl_items);
        let metadata = MetadataClient::new(&config);
        let verifier = IdentityVerifier::new(&config.auth_verify_url, config.provider_timeout_ms);

        Arc::new(Self {
            config,
            cache,
            items,
            metadata,
            verifier,
        })
    }
}
