pub mod diversity;
pub mod feed;
pub mod pagination;
pub mod ranking;
pub mod recall;
pub mod trending;

pub use diversity::DiversityLayer;
pub use feed::{FeedDependencies, FeedService};
pub use pagination::Cursor;
pub use ranking::RankingLayer;
pub use recall::RecallLayer;
pub use trending::TrendingCache;
