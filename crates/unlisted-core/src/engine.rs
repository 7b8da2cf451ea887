//! Engine - the primary entry point for Unlisted
//!
//! Engine coordinates a [`StorageService`] and a [`ContactStore`] for:
//! - Contact lifecycle (one naming-layer keypair per contact)
//! - Publishing the files we share with each contact
//! - Pulling the file lists our contacts share with us
//!
//! Every operation follows the same shape: validate against the local store,
//! query the service, optionally mutate remote state, derive a new contact,
//! persist it, emit. A failure before the persist step leaves the store
//! untouched. There is no rollback of remote state; `remove_contact` and the
//! orphan check in `add_contact` let a retry repair a half-finished call.
//!
//! # Example
//!
//! ```ignore
//! use unlisted_core::{Config, Engine, MemoryStorageService, Storage};
//!
//! let engine = Engine::new(
//!     Arc::new(MemoryStorageService::new()),
//!     Arc::new(Storage::open_in(data_dir)?),
//!     Config::default(),
//! );
//!
//! let alice = engine.add_contact("Alice").await?;
//! let alice = engine.share_files(&[PathBuf::from("report.pdf")], &alice).await?;
//! assert!(alice.send_list().hash().is_some());
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::error::{ContactError, EngineError, StoreError};
use crate::events::Event;
use crate::service::StorageService;
use crate::storage::ContactStore;
use crate::types::Contact;

mod contacts;
mod files;
mod sync;

pub use sync::SyncState;

/// Default capacity for event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Main entry point for Unlisted
///
/// The engine holds no contact state of its own; the store is read afresh by
/// every operation. It never spawns tasks: concurrent uploads and fetches are
/// joined on the caller's task.
pub struct Engine {
    /// Blob store and naming layer
    service: Arc<dyn StorageService>,
    /// Durable contact records
    store: Arc<dyn ContactStore>,
    config: Config,
    /// Event broadcast channel for progress and error observers
    event_tx: broadcast::Sender<Event>,
}

impl Engine {
    /// Create an engine over an injected service and store.
    pub fn new(
        service: Arc<dyn StorageService>,
        store: Arc<dyn ContactStore>,
        config: Config,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            store,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to engine events
    ///
    /// Events are only delivered to receivers that exist when they are
    /// sent. A receiver that falls more than the channel capacity behind
    /// sees `RecvError::Lagged`.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Every stored contact.
    pub fn list_contacts(&self) -> Result<Vec<Contact>, ContactError> {
        self.store
            .list_contacts()
            .map_err(|e| self.report(ContactError::from(e)))
    }

    /// The stored contact called `name`.
    pub fn contact(&self, name: &str) -> Result<Contact, ContactError> {
        self.find_contact(name)
            .map_err(ContactError::from)
            .and_then(|found| found.ok_or(ContactError::ContactDoesNotExist))
            .map_err(|e| self.report(e))
    }

    fn find_contact(&self, name: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self
            .store
            .list_contacts()?
            .into_iter()
            .find(|c| c.display_name() == name))
    }

    /// Send an event; nobody listening is fine.
    fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Publish a classified error to observers and hand it back.
    fn report<E>(&self, err: E) -> E
    where
        E: Clone + Into<EngineError>,
    {
        self.emit(Event::Error(err.clone().into()));
        err
    }

    /// Replace the stored contact by identifier.
    fn persist(&self, contact: Contact) -> Result<Contact, StoreError> {
        self.store.upsert_contact(&contact)?;
        debug!(
            contact = %contact.display_name(),
            id = %contact.identifier(),
            "Persisted contact"
        );
        self.emit(Event::PropertyChanged {
            contact: contact.clone(),
        });
        Ok(contact)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MemoryStorageService;
    use crate::storage::Storage;
    use tempfile::TempDir;

    fn create_test_engine() -> (Engine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open_in(temp_dir.path()).unwrap();
        let engine = Engine::new(
            Arc::new(MemoryStorageService::new()),
            Arc::new(storage),
            Config::default(),
        );
        (engine, temp_dir)
    }

    #[test]
    fn test_engine_starts_without_contacts() {
        let (engine, _temp) = create_test_engine();
        assert!(engine.list_contacts().unwrap().is_empty());
    }

    #[test]
    fn test_missing_contact_is_reported() {
        let (engine, _temp) = create_test_engine();
        let mut events = engine.subscribe_events();

        let result = engine.contact("Nobody");
        assert!(matches!(result, Err(ContactError::ContactDoesNotExist)));

        match events.try_recv().unwrap() {
            Event::Error(EngineError::Contact(ContactError::ContactDoesNotExist)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_persist_emits_property_changed() {
        let (engine, _temp) = create_test_engine();
        let mut events = engine.subscribe_events();

        let contact = Contact::new("Alice", None);
        let stored = engine.persist(contact.clone()).unwrap();
        assert_eq!(stored, contact);
        assert_eq!(engine.contact("Alice").unwrap(), contact);

        match events.try_recv().unwrap() {
            Event::PropertyChanged { contact: changed } => assert_eq!(changed, contact),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let (engine, _temp) = create_test_engine();
        engine.emit(Event::SyncStarted);
    }
}
