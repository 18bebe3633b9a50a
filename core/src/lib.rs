pub mod config;
pub mod models;
pub mod storage;
pub mod store;

mod error;

pub use config::Config;
pub use error::{Error, Operation, Result};
pub use models::FavoriteItem;
pub use store::{FavoritesChange, FavoritesStore, LoadOutcome, SubscriptionId};
