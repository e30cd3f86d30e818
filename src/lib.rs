pub mod cli;
pub mod codec;
pub mod config;
mod db;
pub mod error;
pub mod knn;
mod metrics;
pub mod mnist;
pub mod repository;
pub mod server;

pub use config::Opts;
pub use db::FeatureRecord;
pub use error::{Error, ErrorKind, Result};
pub use repository::{FeatureRepository, FeatureRepositoryBuilder, IdAllocation};
