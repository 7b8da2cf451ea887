//! Persistent contact storage using redb.
//!
//! The engine consumes the narrow [`ContactStore`] contract: read every
//! contact, upsert one by identifier, remove one by identifier. Calls are
//! synchronous and are expected to be fast and in-process; a store backed by
//! a slow remote service must be wrapped to keep that promise.
//!
//! [`Storage`] implements it with one ACID redb table.

use crate::error::StoreError;
use crate::types::Contact;
use parking_lot::RwLock;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

mod contacts;

use contacts::CONTACTS_TABLE;

/// File name of the contact database inside a data directory
pub const DATABASE_FILE: &str = "contacts.redb";

/// Durable record of the contact list.
pub trait ContactStore: Send + Sync {
    /// Every stored contact
    fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;

    /// Insert or fully replace the contact with the same identifier
    fn upsert_contact(&self, contact: &Contact) -> Result<(), StoreError>;

    /// Remove the contact with the same identifier; absent is not an error
    fn remove_contact(&self, contact: &Contact) -> Result<(), StoreError>;
}

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CONTACTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Open the contact database kept in `data_dir`.
    pub fn open_in(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(data_dir.as_ref().join(DATABASE_FILE))
    }

    fn db_handle(&self) -> Arc<RwLock<Database>> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_can_be_created() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let storage = Storage::new(&db_path);
        assert!(storage.is_ok());
    }

    #[test]
    fn test_storage_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/path/to/test.redb");
        let storage = Storage::new(&db_path);
        assert!(storage.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_open_in_uses_database_file() {
        let temp_dir = TempDir::new().unwrap();
        Storage::open_in(temp_dir.path()).unwrap();
        assert!(temp_dir.path().join(DATABASE_FILE).exists());
    }
}
