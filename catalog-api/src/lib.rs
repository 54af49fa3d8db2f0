// Catalog read API library
//
// Provides the HTTP read-path API over the catalog-core services: catalog browsing,
// search, recommendations, and task administration.

pub mod http;

// Re-export commonly used types
pub use http::AppState;
