pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod resilience;
pub mod service;
pub mod telemetry;
pub mod transaction;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use transaction::{UnitOfWork, with_transaction};
pub use cache::KeyBuilder;
