pub mod feed;
pub mod health;

pub use feed::{configure, FeedHandlerState};
pub use health::{health, metrics};
