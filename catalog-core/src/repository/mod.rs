pub mod access_log;
pub mod classifier;
pub mod collect_log;
pub mod rating;
pub mod recommendation;
pub mod search;
pub mod source;
pub mod source_health;
pub mod task;
pub mod video;

pub use access_log::AccessLogRepository;
pub use classifier::ClassifierRepository;
pub use collect_log::CollectLogRepository;
pub use rating::RatingRepository;
pub use recommendation::RecommendationRepository;
pub use search::{AdvancedSearchParams, SearchOrderBy, SearchRepository};
pub use source::SourceRepository;
pub use source_health::SourceHealthRepository;
pub use task::TaskRepository;
pub use video::{ListFilters, ListSortOrder, VideoRepository};
