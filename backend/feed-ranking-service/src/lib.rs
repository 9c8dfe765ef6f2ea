pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod session;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{FeedError, Result};
pub use services::{
    Cursor, DiversityLayer, FeedDependencies, FeedService, RankingLayer, RecallLayer,
    TrendingCache,
};
