//! Storage backends for users and tokens

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStorageProvider;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorageProvider;
pub use traits::{StorageProvider, TokenStorage, UserStorage};
