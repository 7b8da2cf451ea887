//! Contact records.
//!
//! A contact is immutable: every change derives a new value through one of
//! the `with_*` constructors, which is then persisted as a whole, replacing
//! the previous value by identifier.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::file::FileList;

/// Unique, permanent identifier of a contact.
///
/// Uses ULID for time-ordered unique identifiers that sort lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub Ulid);

impl ContactId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse from string representation
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where we publish the file list for a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAddress {
    /// Naming-layer identifier the contact resolves
    pub address: String,
    /// Local alias of the keypair that signs the pointer
    pub keypair_name: String,
}

impl SendAddress {
    pub fn new(address: impl Into<String>, keypair_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            keypair_name: keypair_name.into(),
        }
    }
}

/// Someone we exchange files with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    identifier: ContactId,
    display_name: String,
    send_address: Option<SendAddress>,
    receive_address: Option<String>,
    send_list: FileList,
    receive_list: FileList,
    /// Unix timestamp of creation
    created_at: i64,
}

impl Contact {
    /// A fresh contact with empty file lists and no receive address.
    pub fn new(display_name: impl Into<String>, send_address: Option<SendAddress>) -> Self {
        Self {
            identifier: ContactId::new(),
            display_name: display_name.into(),
            send_address,
            receive_address: None,
            send_list: FileList::new(),
            receive_list: FileList::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn identifier(&self) -> ContactId {
        self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn send_address(&self) -> Option<&SendAddress> {
        self.send_address.as_ref()
    }

    pub fn receive_address(&self) -> Option<&str> {
        self.receive_address.as_deref()
    }

    pub fn send_list(&self) -> &FileList {
        &self.send_list
    }

    pub fn receive_list(&self) -> &FileList {
        &self.receive_list
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Renamed contact publishing under a renamed keypair. Name and send
    /// address always change together.
    pub fn renamed(&self, display_name: impl Into<String>, send_address: SendAddress) -> Self {
        Self {
            display_name: display_name.into(),
            send_address: Some(send_address),
            ..self.clone()
        }
    }

    pub fn with_send_list(&self, send_list: FileList) -> Self {
        Self {
            send_list,
            ..self.clone()
        }
    }

    pub fn with_receive_list(&self, receive_list: FileList) -> Self {
        Self {
            receive_list,
            ..self.clone()
        }
    }

    /// Point the inbound channel somewhere else.
    ///
    /// The receive list is left as it is until the next sync replaces it.
    pub fn with_receive_address(&self, receive_address: Option<String>) -> Self {
        Self {
            receive_address,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentAddress, File};

    fn alice() -> Contact {
        Contact::new("Alice", Some(SendAddress::new("k51alice", "unlisted.Alice")))
    }

    #[test]
    fn test_contact_id_display_roundtrip() {
        let id = ContactId::new();
        let parsed = ContactId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_contact_starts_empty() {
        let contact = alice();
        assert_eq!(contact.display_name(), "Alice");
        assert!(contact.receive_address().is_none());
        assert!(contact.send_list().is_empty());
        assert!(contact.receive_list().is_empty());
        assert!(contact.send_list().hash().is_none());
    }

    #[test]
    fn test_renamed_preserves_identifier() {
        let contact = alice();
        let renamed = contact.renamed("Alicia", SendAddress::new("k51alice", "unlisted.Alicia"));
        assert_eq!(renamed.identifier(), contact.identifier());
        assert_eq!(renamed.display_name(), "Alicia");
        assert_eq!(renamed.send_address().unwrap().keypair_name, "unlisted.Alicia");
    }

    #[test]
    fn test_with_send_list_leaves_original_untouched() {
        let contact = alice();
        let list = FileList::new().merged([File::new("a.txt", ContentAddress::new("h1"))]);
        let updated = contact.with_send_list(list);
        assert_eq!(updated.send_list().len(), 1);
        assert!(contact.send_list().is_empty());
    }

    #[test]
    fn test_changing_receive_address_keeps_receive_list() {
        let contact = alice()
            .with_receive_address(Some("k51bob".into()))
            .with_receive_list(FileList::published(
                ContentAddress::new("list"),
                [File::new("a.txt", ContentAddress::new("h1"))],
            ));

        let moved = contact.with_receive_address(Some("k51carol".into()));
        assert_eq!(moved.receive_address(), Some("k51carol"));
        assert_eq!(moved.receive_list(), contact.receive_list());

        let cleared = contact.with_receive_address(None);
        assert_eq!(cleared.receive_address(), None);
        assert_eq!(cleared.receive_list(), contact.receive_list());
    }
}
