mod backend;
mod database;
mod file_backend;
pub mod schema;

pub use backend::{MemoryBackend, PersistenceBackend};
pub use database::SqliteBackend;
pub use file_backend::FileBackend;
