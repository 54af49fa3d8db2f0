pub mod access_log;
pub mod category_mapping;
pub mod collect_log;
pub mod id;
pub mod pagination;
pub mod rating;
pub mod recommendation;
pub mod source;
pub mod source_health;
pub mod task;
pub mod video;

pub use access_log::{AccessLogEntry, HitStats};
pub use category_mapping::{CategoryMapping, SubCategory};
pub use collect_log::{CollectLogEntry, LogLevel};
pub use id::{LogId, SourceId, TaskId, VideoId};
pub use pagination::{Page, PageParams};
pub use rating::{Rating, RatingStatus};
pub use recommendation::{RecommendationEntry, RecommendationSet};
pub use source::{ResponseFormat, Source};
pub use source_health::{HealthStatus, SourceHealth};
pub use task::{Checkpoint, Task, TaskConfig, TaskKind, TaskProgress, TaskStatus};
pub use video::{
    ClassifyMethod, ClassifyResult, Episode, IncomingVideo, PlaySource, PlayUrls, TypeId, Video,
};
