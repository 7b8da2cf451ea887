//! Synchronization
//!
//! Pulls every contact's published list for us. Resolving and fetching run
//! concurrently for all contacts; each one's network failure is logged and
//! folded into its own result. Decoding and persisting happen afterwards,
//! one contact at a time.

use bytes::Bytes;
use futures::future::join_all;
use tracing::{info, warn};

use super::Engine;
use crate::error::SyncError;
use crate::events::Event;
use crate::types::{Contact, ContentAddress, FileList};

/// Outcome of syncing one contact.
#[derive(Debug, Clone)]
pub enum SyncState {
    /// The contact's receive list was replaced
    Synced { new: Contact, old: Contact },
    /// Nothing changed for this contact
    Failed { contact: Contact, error: SyncError },
}

impl SyncState {
    /// The contact as it is stored after the sync
    pub fn contact(&self) -> &Contact {
        match self {
            SyncState::Synced { new, .. } => new,
            SyncState::Failed { contact, .. } => contact,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced { .. })
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncState::Synced { .. } => None,
            SyncState::Failed { error, .. } => Some(error),
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Synced { new, old } => write!(
                f,
                "synced {} files (was {})",
                new.receive_list().len(),
                old.receive_list().len()
            ),
            SyncState::Failed { error, .. } => write!(f, "failed: {}", error),
        }
    }
}

/// What the network phase produced for one contact
enum Retrieved {
    NotSet,
    Unreachable,
    Fetched {
        address: ContentAddress,
        bytes: Bytes,
    },
}

impl Engine {
    // ═══════════════════════════════════════════════════════════════════════
    // Sync Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch the list every contact publishes for us.
    ///
    /// Returns one [`SyncState`] per stored contact, in store order. Failures
    /// are per contact; the call itself only fails when the store cannot be
    /// read.
    pub async fn sync(&self) -> Result<Vec<SyncState>, SyncError> {
        self.try_sync().await.map_err(|e| self.report(e))
    }

    async fn try_sync(&self) -> Result<Vec<SyncState>, SyncError> {
        let contacts = self.store.list_contacts()?;
        self.emit(Event::SyncStarted);
        info!(contacts = contacts.len(), "Syncing");

        let retrieved = join_all(contacts.iter().map(|c| self.retrieve(c))).await;

        let states: Vec<SyncState> = contacts
            .into_iter()
            .zip(retrieved)
            .map(|(contact, retrieved)| self.settle(contact, retrieved))
            .collect();

        let synced = states.iter().filter(|s| s.is_synced()).count();
        let failed = states.len() - synced;
        info!(synced, failed, "Sync finished");
        self.emit(Event::SyncFinished { synced, failed });

        Ok(states)
    }

    /// Resolve and fetch one contact's list. Never fails.
    async fn retrieve(&self, contact: &Contact) -> Retrieved {
        let Some(receive_address) = contact.receive_address() else {
            return Retrieved::NotSet;
        };

        self.emit(Event::Resolving {
            contact: contact.clone(),
        });
        let address = match self.service.resolve_pointer(receive_address, true).await {
            Ok(address) => address,
            Err(e) => {
                warn!(contact = %contact.display_name(), error = %e, "Failed to resolve file list");
                return Retrieved::Unreachable;
            }
        };

        self.emit(Event::Fetching {
            contact: contact.clone(),
        });
        match self.service.fetch_blob(&address).await {
            Ok(bytes) => Retrieved::Fetched { address, bytes },
            Err(e) => {
                warn!(contact = %contact.display_name(), %address, error = %e, "Failed to fetch file list");
                Retrieved::Unreachable
            }
        }
    }

    fn settle(&self, contact: Contact, retrieved: Retrieved) -> SyncState {
        let (address, bytes) = match retrieved {
            Retrieved::NotSet => {
                return SyncState::Failed {
                    contact,
                    error: SyncError::ReceiveAddressNotSet,
                }
            }
            Retrieved::Unreachable => {
                return SyncState::Failed {
                    contact,
                    error: SyncError::FailedToRetrieveSharedFileList,
                }
            }
            Retrieved::Fetched { address, bytes } => (address, bytes),
        };

        let files = match FileList::decode(&bytes) {
            Ok(files) => files,
            Err(e) => {
                warn!(contact = %contact.display_name(), %address, error = %e, "Invalid file list");
                return SyncState::Failed {
                    contact,
                    error: SyncError::InvalidJsonForObject(address),
                };
            }
        };

        let updated = contact.with_receive_list(FileList::published(address, files));
        match self.persist(updated) {
            Ok(new) => SyncState::Synced { new, old: contact },
            Err(e) => {
                warn!(contact = %contact.display_name(), error = %e, "Failed to store synced contact");
                SyncState::Failed {
                    contact,
                    error: SyncError::from(e),
                }
            }
        }
    }
}
