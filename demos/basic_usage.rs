// Example: Basic usage of the foodshare-core library
use std::fs;

use chrono::Utc;
use foodshare_core::models::{expires_in, FavoriteItem};
use foodshare_core::storage::SqliteBackend;
use foodshare_core::FavoritesStore;

fn main() -> anyhow::Result<()> {
    let db_path = "basic_usage_foodshare.db";
    fs::remove_file(db_path).ok(); // Clean up previous run

    println!("--- Basic Usage of foodshare-core ---");

    // ========== Load the store ==========
    println!("\n1. Loading favorites...");
    let mut store = FavoritesStore::load(SqliteBackend::open(db_path)?);
    println!("   ✓ Loaded ({:?}), {} favorites", store.load_outcome(), store.len());

    store.subscribe(|change, items| {
        println!("   ~ change: {:?} -> {} favorites", change, items.len());
    });

    // ========== Save listings ==========
    println!("\n2. Saving listings...");
    let soup = FavoriteItem::from_listing_json(
        r#"{
            "_id": "665f1c",
            "foodName": "Lentil Soup",
            "foodQuantity": "3 bowls",
            "pickupLocation": "Main St 4",
            "expireDate": "2030-01-02T10:00:00.000Z",
            "donorName": "Sam",
            "donorEmail": "sam@example.com"
        }"#,
    )?;
    store.add_favorite(soup.clone())?;

    let bread = FavoriteItem::new("77a0b2", "Sourdough")
        .with_quantity("2 loaves")
        .with_pickup_location("Bakery Lane 2")
        .with_expire_date("2020-06-01T08:00:00Z");
    store.add_favorite(bread)?;

    // Saving the same listing again changes nothing
    let added = store.add_favorite(soup)?;
    println!("   ✓ Second save of the soup added anything: {}", added);

    // ========== Browse ==========
    println!("\n3. Favorites:");
    let now = Utc::now();
    for item in store.items() {
        println!(
            "   - {} ({}), expires in {}",
            item.name,
            item.quantity,
            expires_in(&item.expire_date, now)
        );
    }

    // ========== Remove and reload ==========
    println!("\n4. Removing and reloading...");
    store.remove_favorite("77a0b2")?;
    let store = FavoritesStore::load(store.dispose());
    println!(
        "   ✓ Reloaded {} favorite(s), soup saved: {}",
        store.len(),
        store.is_favorite("665f1c")
    );

    fs::remove_file(db_path).ok();
    Ok(())
}
