//! Service initialization and dependency injection.
//!
//! Builds every repository and service the catalog platform needs from a single
//! Postgres pool and (optional) Redis connection, following the same
//! construct-once-wire-through-`Arc` shape the teacher's `Services` container used.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::cache::{CacheConfig, CacheManager, KeyBuilder};
use crate::repository::{
    AccessLogRepository, ClassifierRepository, CollectLogRepository, RatingRepository,
    RecommendationRepository, SearchRepository, SourceHealthRepository, SourceRepository,
    TaskRepository, VideoRepository,
};
use crate::service::{
    Aggregator, CatalogStore, Classifier, CollectionEngine, DistributedLock, HitTracker,
    RatingEnricher, Recommender, Scheduler, SearchService, SourceHealthTracker, TaskManager,
    TmdbRatingProvider,
};
use crate::Config;

/// Container for every initialized repository and service, wired together and ready
/// to be shared (via `Arc`) between the collection-side binary and the read-path API.
#[derive(Clone)]
pub struct Services {
    pub videos: Arc<VideoRepository>,
    pub sources: Arc<SourceRepository>,
    pub source_health_repo: Arc<SourceHealthRepository>,
    pub tasks: Arc<TaskRepository>,
    pub collect_logs: Arc<CollectLogRepository>,
    pub access_logs: Arc<AccessLogRepository>,
    pub ratings: Arc<RatingRepository>,
    pub recommendations: Arc<RecommendationRepository>,
    pub search_repo: Arc<SearchRepository>,
    pub classifier_repo: Arc<ClassifierRepository>,

    pub cache: Arc<CacheManager>,
    pub keys: KeyBuilder,
    pub lock: Arc<DistributedLock>,

    pub catalog: Arc<CatalogStore>,
    pub classifier: Arc<Classifier>,
    pub source_health: Arc<SourceHealthTracker>,
    pub task_manager: Arc<TaskManager>,
    pub collection_engine: Arc<CollectionEngine>,
    pub hit_tracker: Arc<HitTracker>,
    pub rating_enricher: Option<Arc<RatingEnricher>>,
    pub aggregator: Arc<Aggregator>,
    pub recommender: Arc<Recommender>,
    pub search: Arc<SearchService>,
    pub scheduler: Arc<Scheduler>,
}

/// Initialize every repository and service from a live Postgres pool and configuration.
///
/// Redis is required: the catalog store, scheduler and task dispatch all serialize
/// through `DistributedLock`, and there is no single-instance fallback path. Startup
/// fails fast with an error if `config.redis.url` is empty rather than silently running
/// without mutual exclusion.
pub async fn init_services(pool: PgPool, config: &Config) -> Result<Services, anyhow::Error> {
    info!("Initializing repositories...");
    let videos = Arc::new(VideoRepository::new(pool.clone()));
    let sources = Arc::new(SourceRepository::new(pool.clone()));
    let source_health_repo = Arc::new(SourceHealthRepository::new(pool.clone()));
    let tasks = Arc::new(TaskRepository::new(pool.clone()));
    let collect_logs = Arc::new(CollectLogRepository::new(pool.clone()));
    let access_logs = Arc::new(AccessLogRepository::new(pool.clone()));
    let ratings = Arc::new(RatingRepository::new(pool.clone()));
    let recommendations = Arc::new(RecommendationRepository::new(pool.clone()));
    let search_repo = Arc::new(SearchRepository::new(pool.clone()));
    let classifier_repo = Arc::new(ClassifierRepository::new(pool.clone()));

    info!("Initializing cache manager...");
    let cache = Arc::new(CacheManager::new(CacheConfig {
        mapping_ttl: std::time::Duration::from_millis(config.rating.mapping_cache_ttl_ms),
        trending_ttl: std::time::Duration::from_secs(config.rating.trending_cache_ttl_s),
        ..CacheConfig::default()
    }));
    let keys = KeyBuilder::from_config(config);

    info!("Connecting to Redis for distributed locking...");
    if config.redis.url.is_empty() {
        warn!("\u{26a0} Redis not configured \u{2014} distributed locking requires it; refusing to start");
        return Err(anyhow::anyhow!("redis.url must be set: distributed locking has no single-instance fallback"));
    }
    let redis_client = redis::Client::open(config.redis.url.clone())?;
    let lock = Arc::new(DistributedLock::new(redis::aio::ConnectionManager::new(redis_client).await?));

    info!("Initializing domain services...");
    let catalog = Arc::new(CatalogStore::new(videos.clone(), lock.clone(), KeyBuilder::from_config(config)));
    let classifier = Arc::new(Classifier::new(classifier_repo.clone(), cache.clone()));
    let source_health = Arc::new(SourceHealthTracker::new(sources.clone(), source_health_repo.clone(), config.source_health.clone()));
    let task_manager = Arc::new(TaskManager::new(tasks.clone()));
    let collection_engine = Arc::new(CollectionEngine::new(
        tasks.clone(),
        collect_logs.clone(),
        catalog.clone(),
        classifier.clone(),
        config.collection.clone(),
    ));
    let hit_tracker = Arc::new(HitTracker::new(access_logs.clone(), config.hits.clone()));

    // Rating enrichment needs a live TMDB-compatible endpoint; without one configured
    // the enricher is simply not constructed and the scheduler/API skip it.
    let rating_enricher: Option<Arc<RatingEnricher>> = if config.rating.provider_url.is_empty() {
        warn!("rating.provider_url not set, rating enrichment disabled");
        None
    } else {
        let provider = Arc::new(TmdbRatingProvider::new(
            config.rating.provider_url.clone(),
            config.rating.provider_api_key.clone(),
            config.rating.provider_timeout_ms,
        ));
        Some(Arc::new(RatingEnricher::new(ratings.clone(), provider, config.rating.clone())))
    };

    let aggregator = Arc::new(Aggregator::new(videos.clone(), cache.clone(), config.collection.welfare_enabled));
    let recommender = Arc::new(Recommender::new(recommendations.clone(), access_logs.clone(), cache.clone()));
    let search = Arc::new(SearchService::new(search_repo.clone()));
    let scheduler = Arc::new(Scheduler::new(
        config.scheduler.clone(),
        source_health.clone(),
        catalog.clone(),
        hit_tracker.clone(),
        lock.clone(),
        KeyBuilder::from_config(config),
    ));

    info!("All services initialized");

    Ok(Services {
        videos,
        sources,
        source_health_repo,
        tasks,
        collect_logs,
        access_logs,
        ratings,
        recommendations,
        search_repo,
        classifier_repo,
        cache,
        keys,
        lock,
        catalog,
        classifier,
        source_health,
        task_manager,
        collection_engine,
        hit_tracker,
        rating_enricher,
        aggregator,
        recommender,
        search,
        scheduler,
    })
}
