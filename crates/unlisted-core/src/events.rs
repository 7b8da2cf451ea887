//! Lifecycle events emitted by the engine
//!
//! Events are side-effect only: observers (progress output, logging, UI
//! refresh) receive them over a broadcast channel and nothing flows back
//! into the engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Event                                                          │
//! │  ├── SyncStarted / SyncFinished: bracket a full sync pass        │
//! │  ├── ListingKeypairs .. Fetching: about to call the service     │
//! │  ├── PropertyChanged: a contact was persisted                    │
//! │  ├── ContactRemoved: a contact left the store                    │
//! │  └── Error: an operation failed with a classified error         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use crate::error::EngineError;
use crate::types::{Contact, ContactId, ContentAddress};

#[derive(Debug, Clone)]
pub enum Event {
    /// A sync pass over all contacts is starting
    SyncStarted,
    /// A sync pass finished
    SyncFinished {
        /// Contacts whose receive list was updated
        synced: usize,
        /// Contacts reported as failed
        failed: usize,
    },
    /// About to list the service's keypairs
    ListingKeypairs,
    /// About to generate a keypair
    GeneratingKeypair { keypair_name: String },
    /// About to remove a keypair
    RemovingKeypair { keypair_name: String },
    /// About to rename a keypair
    RenamingKeypair { from: String, to: String },
    /// About to upload a local file
    Uploading { path: PathBuf },
    /// About to upload a contact's encoded send list
    UploadingFileList { contact: Contact },
    /// About to point a contact's send address at a new list
    Publishing { contact: Contact },
    /// About to resolve a contact's receive address
    Resolving { contact: Contact },
    /// About to fetch a contact's resolved file list
    Fetching { contact: Contact },
    /// About to fetch a shared file's contents
    FetchingFile { hash: ContentAddress },
    /// A contact was written to the store
    PropertyChanged { contact: Contact },
    /// A contact was deleted from the store
    ContactRemoved { identifier: ContactId },
    /// An operation failed
    Error(EngineError),
}

impl Event {
    /// Get the contact this event is about, if any
    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Event::UploadingFileList { contact }
            | Event::Publishing { contact }
            | Event::Resolving { contact }
            | Event::Fetching { contact }
            | Event::PropertyChanged { contact } => Some(contact),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::Error(_))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::SyncStarted => write!(f, "Syncing"),
            Event::SyncFinished { synced, failed } => {
                write!(f, "Sync finished ({} synced, {} failed)", synced, failed)
            }
            Event::ListingKeypairs => write!(f, "Listing keypairs"),
            Event::GeneratingKeypair { keypair_name } => {
                write!(f, "Generating keypair {}", keypair_name)
            }
            Event::RemovingKeypair { keypair_name } => {
                write!(f, "Removing keypair {}", keypair_name)
            }
            Event::RenamingKeypair { from, to } => write!(f, "Renaming keypair {} to {}", from, to),
            Event::Uploading { path } => write!(f, "Uploading {}", path.display()),
            Event::UploadingFileList { contact } => {
                write!(f, "Uploading file list for {}", contact.display_name())
            }
            Event::Publishing { contact } => {
                write!(f, "Publishing file list for {}", contact.display_name())
            }
            Event::Resolving { contact } => {
                write!(f, "Resolving file list from {}", contact.display_name())
            }
            Event::Fetching { contact } => {
                write!(f, "Fetching file list from {}", contact.display_name())
            }
            Event::FetchingFile { hash } => write!(f, "Fetching {}", hash),
            Event::PropertyChanged { contact } => write!(f, "Updated {}", contact.display_name()),
            Event::ContactRemoved { identifier } => write!(f, "Removed contact {}", identifier),
            Event::Error(err) => write!(f, "Error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContactError;

    #[test]
    fn test_event_contact() {
        let contact = Contact::new("Alice", None);

        let event = Event::PropertyChanged {
            contact: contact.clone(),
        };
        assert_eq!(event.contact(), Some(&contact));

        let event = Event::SyncStarted;
        assert_eq!(event.contact(), None);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::SyncStarted), "Syncing");
        assert_eq!(
            format!("{}", Event::SyncFinished { synced: 2, failed: 1 }),
            "Sync finished (2 synced, 1 failed)"
        );
        assert_eq!(
            format!("{}", Event::Error(ContactError::ContactDoesNotExist.into())),
            "Error: contact does not exist"
        );
    }

    #[test]
    fn test_is_error() {
        assert!(Event::Error(ContactError::ContactAlreadyExists.into()).is_error());
        assert!(!Event::ListingKeypairs.is_error());
    }
}
