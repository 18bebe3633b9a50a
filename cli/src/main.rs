use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use foodshare_core::models::{expires_in, FavoriteItem};
use foodshare_core::storage::PersistenceBackend;
use foodshare_core::{Config, FavoritesStore, LoadOutcome};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "foodshare")]
#[command(version, about = "Manage saved foodshare listings", long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "foodshare.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved favorites
    List,
    /// Save a listing as a favorite
    Add(ItemArgs),
    /// Remove a favorite by listing id
    Remove { id: String },
    /// Save the listing if absent, remove it otherwise
    Toggle(ItemArgs),
    /// Check whether a listing is a favorite
    Check { id: String },
    /// Remove every favorite
    Clear,
    /// Write the default config file
    InitConfig,
}

#[derive(Args)]
struct ItemArgs {
    /// Listing document as returned by the foodshare API
    #[arg(long, conflicts_with_all = ["id", "name"])]
    json: Option<String>,

    #[arg(long, required_unless_present = "json")]
    id: Option<String>,

    #[arg(long, required_unless_present = "json")]
    name: Option<String>,

    #[arg(long)]
    image_url: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Expiry timestamp, e.g. 2025-01-02T10:00:00Z
    #[arg(long)]
    expires: Option<String>,

    #[arg(long)]
    donor: Option<String>,

    #[arg(long)]
    quantity: Option<String>,
}

impl ItemArgs {
    fn into_item(self) -> Result<FavoriteItem> {
        if let Some(json) = self.json {
            return FavoriteItem::from_listing_json(&json).context("Invalid listing JSON");
        }

        let mut item =
            FavoriteItem::new(self.id.unwrap_or_default(), self.name.unwrap_or_default());
        item.image_url = self.image_url;
        item.pickup_location = self.location.unwrap_or_default();
        item.expire_date = self.expires.unwrap_or_default();
        item.donor_name = self.donor.unwrap_or_default();
        item.quantity = self.quantity.unwrap_or_default();
        Ok(item)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::InitConfig = cli.command {
        config.save(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let backend = config
        .storage
        .open_backend()
        .context("Failed to open favorites storage")?;
    let mut store = FavoritesStore::load_with_key(backend, config.storage.key.clone());

    match store.load_outcome() {
        LoadOutcome::Corrupt | LoadOutcome::UnsupportedVersion(_) => {
            eprintln!("Warning: stored favorites could not be read, starting with an empty list");
        }
        LoadOutcome::Unavailable => {
            eprintln!("Warning: favorites storage is unreadable, changes are disabled");
        }
        _ => {}
    }

    store.subscribe(|change, items| {
        tracing::info!(?change, total = items.len(), "Favorites updated");
    });

    run(cli.command, &mut store)
}

fn run<B: PersistenceBackend>(command: Commands, store: &mut FavoritesStore<B>) -> Result<()> {
    match command {
        Commands::List => print_favorites(store.items()),
        Commands::Add(args) => {
            let item = args.into_item()?;
            let id = item.id.clone();
            if store.add_favorite(item)? {
                println!("Added '{}' to favorites", id);
            } else {
                println!("'{}' is already a favorite", id);
            }
        }
        Commands::Remove { id } => {
            if store.remove_favorite(&id)? {
                println!("Removed '{}' from favorites", id);
            } else {
                println!("'{}' is not a favorite", id);
            }
        }
        Commands::Toggle(args) => {
            let item = args.into_item()?;
            let id = item.id.clone();
            if store.toggle_favorite(item)? {
                println!("Added '{}' to favorites", id);
            } else {
                println!("Removed '{}' from favorites", id);
            }
        }
        Commands::Check { id } => {
            if store.is_favorite(&id) {
                println!("'{}' is a favorite", id);
            } else {
                println!("'{}' is not a favorite", id);
            }
        }
        Commands::Clear => {
            let count = store.len();
            store.clear()?;
            println!("Removed {} favorites", count);
        }
        Commands::InitConfig => {}
    }

    Ok(())
}

fn print_favorites(items: &[FavoriteItem]) {
    if items.is_empty() {
        println!("No favorites yet.");
        return;
    }

    let now = Utc::now();
    for item in items {
        println!("{}  {}", item.id, item.name);
        println!("    Expires in: {}", expires_in(&item.expire_date, now));
        if !item.pickup_location.is_empty() {
            println!("    Location:   {}", item.pickup_location);
        }
        if !item.donor_name.is_empty() {
            println!("    Donor:      {}", item.donor_name);
        }
        if !item.quantity.is_empty() {
            println!("    Quantity:   {}", item.quantity);
        }
    }
}
