use crate::models::FavoriteItem;
use crate::storage::schema::{self, Decoded};
use crate::storage::PersistenceBackend;
use crate::{Error, Operation, Result};
use std::collections::HashSet;

/// Storage key the favorites collection lives under
pub const DEFAULT_STORAGE_KEY: &str = "foodshare_favorites";

/// How the collection was obtained when the store was loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Current-format payload read successfully
    Loaded,
    /// Nothing stored yet
    Missing,
    /// Unversioned payload from an older client, upgraded on next write
    Migrated,
    /// Payload could not be parsed, started empty
    Corrupt,
    /// Payload written by a newer schema, started empty
    UnsupportedVersion(u32),
    /// Backend read failed, started empty and read-only
    Unavailable,
}

/// Change delivered to subscribers after a successful mutation
#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesChange {
    Added(FavoriteItem),
    Removed(FavoriteItem),
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&FavoritesChange, &[FavoriteItem])>;

/// Favorites collection mirrored write-through into a persistence backend.
///
/// Every mutation writes the whole collection before returning. When the
/// write fails, the in-memory change is undone and an [`Error::Persist`]
/// naming the operation is returned, so memory and storage never diverge.
///
/// Subscribers are invoked synchronously after each successful mutation and
/// only receive shared data. A callback that reaches back into the store
/// through an `Rc<RefCell<_>>` panics with a `BorrowMutError` instead of
/// mutating it mid-notification.
pub struct FavoritesStore<B: PersistenceBackend> {
    backend: B,
    key: String,
    items: Vec<FavoriteItem>,
    index: HashSet<String>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    load_outcome: LoadOutcome,
}

impl<B: PersistenceBackend> FavoritesStore<B> {
    /// Load the store from `backend` using the default storage key
    pub fn load(backend: B) -> Self {
        Self::load_with_key(backend, DEFAULT_STORAGE_KEY)
    }

    /// Load the store from `backend`.
    ///
    /// Never fails: a missing or unparseable payload yields an empty
    /// collection, and the reason is available from [`load_outcome`]. When
    /// the backend itself cannot be read the store also starts empty but
    /// refuses writes until [`reload`] succeeds, so the unread collection is
    /// never overwritten.
    ///
    /// [`load_outcome`]: FavoritesStore::load_outcome
    /// [`reload`]: FavoritesStore::reload
    pub fn load_with_key(backend: B, key: impl Into<String>) -> Self {
        let key = key.into();
        let (items, load_outcome) = read_collection(&backend, &key);
        let index = items.iter().map(|item| item.id.clone()).collect();

        Self {
            backend,
            key,
            items,
            index,
            subscribers: Vec::new(),
            next_subscription: 0,
            load_outcome,
        }
    }

    /// Re-read the collection from the backend, keeping subscribers
    pub fn reload(&mut self) -> LoadOutcome {
        let (items, load_outcome) = read_collection(&self.backend, &self.key);
        self.index = items.iter().map(|item| item.id.clone()).collect();
        self.items = items;
        self.load_outcome = load_outcome;
        load_outcome
    }

    /// End the store's lifecycle, dropping subscribers and returning the backend
    pub fn dispose(self) -> B {
        self.backend
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        self.load_outcome
    }

    /// True while the stored collection is unread and writes are refused
    pub fn is_read_only(&self) -> bool {
        self.load_outcome == LoadOutcome::Unavailable
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Owned snapshot of the collection in insertion order
    pub fn list(&self) -> Vec<FavoriteItem> {
        self.items.clone()
    }

    /// Borrowed view of the collection
    pub fn items(&self) -> &[FavoriteItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&FavoriteItem> {
        if !self.index.contains(id) {
            return None;
        }
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `item` unless its id is already present.
    ///
    /// Returns `Ok(false)` when the id was already a favorite; the existing
    /// entry keeps its snapshot and position.
    pub fn add_favorite(&mut self, item: FavoriteItem) -> Result<bool> {
        item.validate()?;

        if self.index.contains(&item.id) {
            tracing::debug!(id = %item.id, "Already a favorite");
            return Ok(false);
        }
        self.ensure_writable(Operation::Add, Some(item.id.as_str()))?;

        let id = item.id.clone();
        self.index.insert(id.clone());
        self.items.push(item.clone());

        if let Err(e) = self.persist(Operation::Add, &id) {
            self.items.pop();
            self.index.remove(&id);
            return Err(e);
        }

        tracing::debug!(%id, "Favorite added");
        self.notify(FavoritesChange::Added(item));
        Ok(true)
    }

    /// Remove the favorite with `id`. Returns `Ok(false)` when it was absent.
    pub fn remove_favorite(&mut self, id: &str) -> Result<bool> {
        let Some(position) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        self.ensure_writable(Operation::Remove, Some(id))?;

        let removed = self.items.remove(position);
        self.index.remove(id);

        if let Err(e) = self.persist(Operation::Remove, id) {
            self.index.insert(removed.id.clone());
            self.items.insert(position, removed);
            return Err(e);
        }

        tracing::debug!(%id, "Favorite removed");
        self.notify(FavoritesChange::Removed(removed));
        Ok(true)
    }

    /// Add `item` if absent, remove it otherwise. Returns the new membership.
    pub fn toggle_favorite(&mut self, item: FavoriteItem) -> Result<bool> {
        if self.is_favorite(&item.id) {
            self.remove_favorite(&item.id)?;
            Ok(false)
        } else {
            self.add_favorite(item)?;
            Ok(true)
        }
    }

    /// Remove every favorite and delete the stored entry
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable(Operation::Clear, None)?;

        if let Err(source) = self.backend.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %source, "Clearing favorites failed");
            return Err(Error::Persist {
                op: Operation::Clear,
                id: None,
                source: Box::new(source),
            });
        }

        if self.items.is_empty() {
            return Ok(());
        }

        self.items.clear();
        self.index.clear();
        tracing::debug!("Favorites cleared");
        self.notify(FavoritesChange::Cleared);
        Ok(())
    }

    /// Register a callback run after every successful mutation
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FavoritesChange, &[FavoriteItem]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if the subscription was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn persist(&mut self, op: Operation, id: &str) -> Result<()> {
        let result = schema::encode(&self.items)
            .and_then(|payload| self.backend.set(&self.key, &payload));

        result.map_err(|source| {
            tracing::warn!(
                key = %self.key,
                %op,
                %id,
                error = %source,
                "Favorites write failed, rolling back"
            );
            Error::Persist {
                op,
                id: Some(id.to_string()),
                source: Box::new(source),
            }
        })
    }

    fn ensure_writable(&self, op: Operation, id: Option<&str>) -> Result<()> {
        if !self.is_read_only() {
            return Ok(());
        }

        tracing::warn!(key = %self.key, %op, "Stored favorites were never read, refusing write");
        Err(Error::Persist {
            op,
            id: id.map(str::to_string),
            source: Box::new(Error::Storage(
                "stored favorites could not be read, reload before modifying".to_string(),
            )),
        })
    }

    fn notify(&mut self, change: FavoritesChange) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&change, &self.items);
        }
    }
}

fn read_collection<B: PersistenceBackend>(
    backend: &B,
    key: &str,
) -> (Vec<FavoriteItem>, LoadOutcome) {
    let (items, load_outcome) = match backend.get(key) {
        Ok(None) => (Vec::new(), LoadOutcome::Missing),
        Ok(Some(payload)) => match schema::decode(&payload) {
            Decoded::Current(items) => (items, LoadOutcome::Loaded),
            Decoded::Legacy(items) => {
                tracing::info!(count = items.len(), "Migrating unversioned favorites payload");
                (items, LoadOutcome::Migrated)
            }
            Decoded::UnsupportedVersion(version) => {
                tracing::warn!(version, "Unsupported favorites schema version, starting empty");
                (Vec::new(), LoadOutcome::UnsupportedVersion(version))
            }
            Decoded::Corrupt(reason) => {
                tracing::warn!(%key, %reason, "Failed to parse stored favorites, starting empty");
                (Vec::new(), LoadOutcome::Corrupt)
            }
        },
        Err(e) => {
            tracing::warn!(%key, error = %e, "Failed to read stored favorites, writes disabled");
            (Vec::new(), LoadOutcome::Unavailable)
        }
    };

    tracing::debug!(%key, count = items.len(), ?load_outcome, "Favorites loaded");
    (items, load_outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBackend, MemoryBackend, SqliteBackend};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn rice() -> FavoriteItem {
        FavoriteItem::new("f1", "Rice").with_quantity("5 kg")
    }

    fn bread() -> FavoriteItem {
        FavoriteItem::new("f2", "Bread").with_pickup_location("Bakery Lane 2")
    }

    fn ids(store: &FavoritesStore<MemoryBackend>) -> Vec<String> {
        store.list().into_iter().map(|item| item.id).collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        assert_eq!(store.load_outcome(), LoadOutcome::Missing);
        assert!(store.list().is_empty());

        assert!(store.add_favorite(FavoriteItem::new("f1", "Rice")).unwrap());
        assert_eq!(store.list(), vec![FavoriteItem::new("f1", "Rice")]);
        assert!(store.is_favorite("f1"));

        assert!(!store.add_favorite(FavoriteItem::new("f1", "Rice")).unwrap());
        assert_eq!(store.len(), 1);

        assert!(store.remove_favorite("f1").unwrap());
        assert!(store.list().is_empty());
        assert!(!store.is_favorite("f1"));
    }

    #[test]
    fn test_duplicate_add_keeps_original_snapshot_and_order() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();
        store.add_favorite(bread()).unwrap();

        let renamed = FavoriteItem::new("f1", "Brown Rice");
        assert!(!store.add_favorite(renamed).unwrap());

        assert_eq!(ids(&store), vec!["f1", "f2"]);
        assert_eq!(store.get("f1").unwrap().name, "Rice");
    }

    #[test]
    fn test_add_then_remove_restores_prior_state() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();
        let before = store.list();

        store.add_favorite(bread()).unwrap();
        store.remove_favorite("f2").unwrap();

        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();

        assert!(!store.remove_favorite("missing").unwrap());
        assert_eq!(ids(&store), vec!["f1"]);
    }

    #[test]
    fn test_reload_from_same_backend() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();
        store.add_favorite(bread()).unwrap();

        let reloaded = FavoritesStore::load(store.dispose());
        assert_eq!(reloaded.load_outcome(), LoadOutcome::Loaded);
        assert_eq!(reloaded.list(), vec![rice(), bread()]);
        assert!(reloaded.is_favorite("f2"));
    }

    #[test]
    fn test_corrupt_payload_starts_empty() {
        let backend = MemoryBackend::new().with_entry(DEFAULT_STORAGE_KEY, "{{not json");
        let mut store = FavoritesStore::load(backend);

        assert_eq!(store.load_outcome(), LoadOutcome::Corrupt);
        assert!(store.is_empty());

        // The next write replaces the corrupt payload
        store.add_favorite(rice()).unwrap();
        let reloaded = FavoritesStore::load(store.dispose());
        assert_eq!(reloaded.list(), vec![rice()]);
    }

    #[test]
    fn test_unsupported_version_starts_empty() {
        let backend =
            MemoryBackend::new().with_entry(DEFAULT_STORAGE_KEY, r#"{"version":99,"items":[]}"#);
        let store = FavoritesStore::load(backend);
        assert_eq!(store.load_outcome(), LoadOutcome::UnsupportedVersion(99));
        assert!(store.is_empty());
    }

    #[test]
    fn test_legacy_payload_is_migrated_on_write() {
        let legacy = r#"[{"_id":"a1","foodName":"Apples","donorName":"Kim"}]"#;
        let backend = MemoryBackend::new().with_entry(DEFAULT_STORAGE_KEY, legacy);
        let mut store = FavoritesStore::load(backend);
        assert_eq!(store.load_outcome(), LoadOutcome::Migrated);
        assert!(store.is_favorite("a1"));

        store.add_favorite(rice()).unwrap();
        let backend = store.dispose();
        let raw = backend.raw(DEFAULT_STORAGE_KEY).unwrap();
        assert!(raw.starts_with(r#"{"version":1"#));

        let reloaded = FavoritesStore::load(backend);
        assert_eq!(reloaded.load_outcome(), LoadOutcome::Loaded);
        assert_eq!(ids(&reloaded), vec!["a1", "f1"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();

        let mut snapshot = store.list();
        snapshot[0].name = "Changed".to_string();
        snapshot.push(bread());

        assert_eq!(store.list(), vec![rice()]);
        assert!(!store.is_favorite("f2"));
    }

    #[test]
    fn test_add_rejects_invalid_item() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        let err = store.add_favorite(FavoriteItem::new("", "Nameless")).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.is_empty());
        assert!(store.dispose().raw(DEFAULT_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_add_rolls_back_on_write_failure() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();

        let notified = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&notified);
        store.subscribe(move |_, _| *counter.borrow_mut() += 1);

        store.backend.fail_writes(true);
        let err = store.add_favorite(bread()).unwrap_err();

        assert_eq!(err.operation(), Some(Operation::Add));
        assert!(matches!(err, Error::Persist { id: Some(ref id), .. } if id == "f2"));
        assert_eq!(ids(&store), vec!["f1"]);
        assert!(!store.is_favorite("f2"));
        assert_eq!(*notified.borrow(), 0);

        let reloaded = FavoritesStore::load(store.dispose());
        assert_eq!(reloaded.list(), vec![rice()]);
    }

    #[test]
    fn test_remove_rolls_back_to_original_position() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();
        store.add_favorite(bread()).unwrap();
        store.add_favorite(FavoriteItem::new("f3", "Soup")).unwrap();

        store.backend.fail_writes(true);
        let err = store.remove_favorite("f2").unwrap_err();

        assert_eq!(err.operation(), Some(Operation::Remove));
        assert_eq!(ids(&store), vec!["f1", "f2", "f3"]);
        assert!(store.is_favorite("f2"));
    }

    #[test]
    fn test_clear() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        store.add_favorite(rice()).unwrap();
        store.add_favorite(bread()).unwrap();

        store.backend.fail_writes(true);
        assert_eq!(store.clear().unwrap_err().operation(), Some(Operation::Clear));
        assert_eq!(store.len(), 2);

        store.backend.fail_writes(false);
        store.clear().unwrap();
        assert!(store.is_empty());

        let reloaded = FavoritesStore::load(store.dispose());
        assert_eq!(reloaded.load_outcome(), LoadOutcome::Missing);
    }

    #[test]
    fn test_toggle() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        assert!(store.toggle_favorite(rice()).unwrap());
        assert!(store.is_favorite("f1"));
        assert!(!store.toggle_favorite(rice()).unwrap());
        assert!(!store.is_favorite("f1"));
    }

    #[test]
    fn test_subscribers_see_new_state() {
        let mut store = FavoritesStore::load(MemoryBackend::new());
        let seen: Rc<RefCell<Vec<(FavoritesChange, usize)>>> = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        let sub = store.subscribe(move |change, items| {
            log.borrow_mut().push((change.clone(), items.len()));
        });

        store.add_favorite(rice()).unwrap();
        store.add_favorite(rice()).unwrap();
        store.remove_favorite("missing").unwrap();
        store.add_favorite(bread()).unwrap();
        store.remove_favorite("f1").unwrap();
        store.clear().unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (FavoritesChange::Added(rice()), 1),
                (FavoritesChange::Added(bread()), 2),
                (FavoritesChange::Removed(rice()), 1),
                (FavoritesChange::Cleared, 0),
            ]
        );

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.add_favorite(rice()).unwrap();
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn test_subscriber_cannot_reenter_shared_store() {
        let shared = Rc::new(RefCell::new(FavoritesStore::load(MemoryBackend::new())));
        let reentry_blocked = Rc::new(RefCell::new(None));

        let weak = Rc::downgrade(&shared);
        let blocked = Rc::clone(&reentry_blocked);
        shared.borrow_mut().subscribe(move |_, _| {
            if let Some(store) = weak.upgrade() {
                *blocked.borrow_mut() = Some(store.try_borrow_mut().is_err());
            }
        });

        shared.borrow_mut().add_favorite(rice()).unwrap();

        assert_eq!(*reentry_blocked.borrow(), Some(true));
        assert_eq!(shared.borrow().list(), vec![rice()]);
    }

    #[test]
    fn test_unreadable_backend_refuses_writes() {
        let mut seeded = FavoritesStore::load(MemoryBackend::new());
        seeded.add_favorite(FavoriteItem::new("a", "Apples")).unwrap();
        seeded.add_favorite(FavoriteItem::new("b", "Beans")).unwrap();

        let mut backend = seeded.dispose();
        backend.fail_reads(true);
        let mut store = FavoritesStore::load(backend);

        assert_eq!(store.load_outcome(), LoadOutcome::Unavailable);
        assert!(store.is_read_only());
        assert!(store.is_empty());

        let err = store.add_favorite(FavoriteItem::new("c", "Carrots")).unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Add));
        assert_eq!(store.clear().unwrap_err().operation(), Some(Operation::Clear));
        assert!(store.is_empty());

        store.backend.fail_reads(false);
        assert_eq!(store.reload(), LoadOutcome::Loaded);
        assert!(!store.is_read_only());

        store.add_favorite(FavoriteItem::new("c", "Carrots")).unwrap();
        let reloaded = FavoritesStore::load(store.dispose());
        let ids: Vec<String> = reloaded.list().into_iter().map(|item| item.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_custom_key_is_isolated() {
        let mut store = FavoritesStore::load_with_key(MemoryBackend::new(), "other_profile");
        store.add_favorite(rice()).unwrap();
        assert_eq!(store.storage_key(), "other_profile");

        let backend = store.dispose();
        assert!(backend.raw(DEFAULT_STORAGE_KEY).is_none());
        assert!(FavoritesStore::load(backend).is_empty());
    }

    #[test]
    fn test_sqlite_backend_round_trip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("foodshare.db");

        let mut store = FavoritesStore::load(SqliteBackend::open(&db_path).unwrap());
        store.add_favorite(rice()).unwrap();
        drop(store);

        let store = FavoritesStore::load(SqliteBackend::open(&db_path).unwrap());
        assert_eq!(store.list(), vec![rice()]);
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempdir().unwrap();

        let mut store = FavoritesStore::load(FileBackend::new(dir.path()).unwrap());
        store.add_favorite(bread()).unwrap();
        store.add_favorite(rice()).unwrap();
        store.remove_favorite("f2").unwrap();
        drop(store);

        let store = FavoritesStore::load(FileBackend::new(dir.path()).unwrap());
        assert_eq!(store.list(), vec![rice()]);
    }
}
