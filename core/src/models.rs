mod expiry;
mod favorite_item;

pub use expiry::{expires_in, parse_expire_date, ExpiresIn};
pub use favorite_item::FavoriteItem;
