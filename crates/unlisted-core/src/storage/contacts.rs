//! Contact table
//!
//! Contacts are postcard-encoded and keyed by their identifier, so a write
//! always replaces the whole record.

use crate::error::StoreError;
use crate::types::Contact;
use redb::{ReadableTable, TableDefinition};

use super::{ContactStore, Storage};

/// Table for contacts (key: ContactId string, value: serialized Contact)
pub(crate) const CONTACTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("contacts");

impl ContactStore for Storage {
    fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CONTACTS_TABLE)?;

        let mut contacts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let contact: Contact = postcard::from_bytes(value.value())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            contacts.push(contact);
        }

        Ok(contacts)
    }

    fn upsert_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;
            let serialized = postcard::to_allocvec(contact)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let key = contact.identifier().to_string();
            table.insert(key.as_str(), serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;
            let key = contact.identifier().to_string();
            table.remove(key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactId, ContentAddress, File, FileList, SendAddress};
    use tempfile::TempDir;

    /// Read one contact straight from the table
    fn load_contact(storage: &Storage, id: &ContactId) -> Option<Contact> {
        let db = storage.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read().unwrap();
        let table = read_txn.open_table(CONTACTS_TABLE).unwrap();
        let key = id.to_string();
        let data = table.get(key.as_str()).unwrap()?;
        let contact = postcard::from_bytes(data.value()).unwrap();
        Some(contact)
    }

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let storage = Storage::new(&db_path).unwrap();
        (storage, temp_dir)
    }

    fn contact(name: &str) -> Contact {
        Contact::new(
            name,
            Some(SendAddress::new(
                format!("k51{}", name),
                format!("unlisted.{}", name),
            )),
        )
    }

    #[test]
    fn test_upsert_and_load_contact() {
        let (storage, _temp) = create_test_storage();
        let alice = contact("Alice");

        storage.upsert_contact(&alice).unwrap();

        let loaded = load_contact(&storage, &alice.identifier());
        assert_eq!(loaded, Some(alice));
    }

    #[test]
    fn test_load_nonexistent_contact() {
        let (storage, _temp) = create_test_storage();
        assert!(load_contact(&storage, &ContactId::new()).is_none());
    }

    #[test]
    fn test_upsert_replaces_by_identifier() {
        let (storage, _temp) = create_test_storage();
        let alice = contact("Alice");
        storage.upsert_contact(&alice).unwrap();

        let list = FileList::published(
            ContentAddress::new("list"),
            [File::new("report.pdf", ContentAddress::new("h1"))],
        );
        let updated = alice.with_send_list(list);
        storage.upsert_contact(&updated).unwrap();

        let contacts = storage.list_contacts().unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0], updated);
    }

    #[test]
    fn test_list_contacts() {
        let (storage, _temp) = create_test_storage();

        storage.upsert_contact(&contact("Alice")).unwrap();
        storage.upsert_contact(&contact("Bob")).unwrap();
        storage.upsert_contact(&contact("Carol")).unwrap();

        let contacts = storage.list_contacts().unwrap();
        assert_eq!(contacts.len(), 3);

        let names: Vec<_> = contacts.iter().map(|c| c.display_name()).collect();
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"Bob"));
        assert!(names.contains(&"Carol"));
    }

    #[test]
    fn test_remove_contact() {
        let (storage, _temp) = create_test_storage();
        let alice = contact("Alice");
        storage.upsert_contact(&alice).unwrap();

        storage.remove_contact(&alice).unwrap();
        assert!(storage.list_contacts().unwrap().is_empty());

        // Removing again is fine
        storage.remove_contact(&alice).unwrap();
    }

    #[test]
    fn test_contacts_persist_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let alice = contact("Alice").with_receive_address(Some("k51bob".into()));

        {
            let storage = Storage::new(&db_path).unwrap();
            storage.upsert_contact(&alice).unwrap();
        }

        {
            let storage = Storage::new(&db_path).unwrap();
            let loaded = load_contact(&storage, &alice.identifier()).unwrap();
            assert_eq!(loaded.receive_address(), Some("k51bob"));
        }
    }
}
