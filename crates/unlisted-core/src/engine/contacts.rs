//! Contact lifecycle
//!
//! Each contact owns a keypair on the storage service named
//! `{keypair_prefix}.{display_name}`. The keypair's public name is the
//! contact's send address: where our file list for them is published.

use tracing::{debug, info};

use super::Engine;
use crate::error::{ContactError, EngineError};
use crate::events::Event;
use crate::service::Keypair;
use crate::types::{Contact, SendAddress};

impl Engine {
    // ═══════════════════════════════════════════════════════════════════════
    // Contact Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a contact called `name` and publish an empty file list for it.
    ///
    /// A keypair left behind by an earlier, interrupted call counts as an
    /// existing contact; remove it first with [`remove_contact`].
    ///
    /// The contact is persisted before its list is published. If publishing
    /// fails the contact stays, and the error is a [`FileError`].
    ///
    /// [`remove_contact`]: Engine::remove_contact
    /// [`FileError`]: crate::FileError
    pub async fn add_contact(&self, name: &str) -> Result<Contact, EngineError> {
        self.try_add_contact(name).await.map_err(|e| self.report(e))
    }

    async fn try_add_contact(&self, name: &str) -> Result<Contact, EngineError> {
        if self.find_contact(name).map_err(ContactError::from)?.is_some() {
            return Err(ContactError::ContactAlreadyExists.into());
        }

        let keypair_name = self.config.keypair_name(name);
        let keypairs = self.list_keypairs().await?;
        if has_keypair(&keypairs, &keypair_name) {
            debug!(%keypair_name, "Keypair already exists");
            return Err(ContactError::ContactAlreadyExists.into());
        }

        self.emit(Event::GeneratingKeypair {
            keypair_name: keypair_name.clone(),
        });
        let keypair = self
            .service
            .generate_keypair(&keypair_name, self.config.key_algorithm)
            .await
            .map_err(ContactError::from)?;

        let contact = Contact::new(name, Some(SendAddress::new(keypair.id, keypair.name)));
        let contact = self.persist(contact).map_err(ContactError::from)?;
        info!(contact = %name, id = %contact.identifier(), "Added contact");

        Ok(self.try_publish_file_list(&contact).await?)
    }

    /// Remove the contact called `name`, local record and keypair alike.
    ///
    /// Succeeds when either half exists, so it also cleans up after an
    /// interrupted `add_contact`.
    pub async fn remove_contact(&self, name: &str) -> Result<(), ContactError> {
        self.try_remove_contact(name)
            .await
            .map_err(|e| self.report(e))
    }

    async fn try_remove_contact(&self, name: &str) -> Result<(), ContactError> {
        let local = self.find_contact(name)?;
        let keypair_name = local
            .as_ref()
            .and_then(|c| c.send_address())
            .map(|address| address.keypair_name.clone())
            .unwrap_or_else(|| self.config.keypair_name(name));

        let keypairs = self.list_keypairs().await?;
        let remote = has_keypair(&keypairs, &keypair_name);
        if local.is_none() && !remote {
            return Err(ContactError::ContactDoesNotExist);
        }

        if remote {
            self.emit(Event::RemovingKeypair {
                keypair_name: keypair_name.clone(),
            });
            self.service.remove_keypair(&keypair_name).await?;
            debug!(%keypair_name, "Removed keypair");
        }

        if let Some(contact) = local {
            self.store.remove_contact(&contact)?;
            self.emit(Event::ContactRemoved {
                identifier: contact.identifier(),
            });
        }

        info!(contact = %name, "Removed contact");
        Ok(())
    }

    /// Rename a contact together with its keypair.
    ///
    /// The keypair's public name does not change, so the contact keeps
    /// resolving our list at the same address.
    pub async fn rename_contact(&self, name: &str, new_name: &str) -> Result<Contact, ContactError> {
        self.try_rename_contact(name, new_name)
            .await
            .map_err(|e| self.report(e))
    }

    async fn try_rename_contact(&self, name: &str, new_name: &str) -> Result<Contact, ContactError> {
        let contacts = self.store.list_contacts()?;
        let contact = contacts
            .iter()
            .find(|c| c.display_name() == name)
            .ok_or(ContactError::ContactDoesNotExist)?;
        if contacts.iter().any(|c| c.display_name() == new_name) {
            return Err(ContactError::ContactAlreadyExists);
        }

        let old_keypair = contact
            .send_address()
            .map(|address| address.keypair_name.clone())
            .unwrap_or_else(|| self.config.keypair_name(name));
        let new_keypair = self.config.keypair_name(new_name);

        let keypairs = self.list_keypairs().await?;
        if !has_keypair(&keypairs, &old_keypair) {
            return Err(ContactError::ContactDoesNotExist);
        }
        if has_keypair(&keypairs, &new_keypair) {
            return Err(ContactError::ContactAlreadyExists);
        }

        self.emit(Event::RenamingKeypair {
            from: old_keypair.clone(),
            to: new_keypair.clone(),
        });
        let renamed = self
            .service
            .rename_keypair(&old_keypair, &new_keypair)
            .await?;

        let updated = contact.renamed(new_name, SendAddress::new(renamed.id, renamed.now));
        let updated = self.persist(updated)?;
        info!(from = %name, to = %new_name, "Renamed contact");
        Ok(updated)
    }

    /// Set the naming-layer address the contact publishes their list for
    /// us under. `None` stops syncing from them.
    ///
    /// Local only; the new list is fetched by the next [`sync`](Engine::sync).
    pub fn set_receive_address(
        &self,
        name: &str,
        address: Option<String>,
    ) -> Result<Contact, ContactError> {
        self.try_set_receive_address(name, address)
            .map_err(|e| self.report(e))
    }

    fn try_set_receive_address(
        &self,
        name: &str,
        address: Option<String>,
    ) -> Result<Contact, ContactError> {
        let contact = self
            .find_contact(name)?
            .ok_or(ContactError::ContactDoesNotExist)?;
        let updated = self.persist(contact.with_receive_address(address))?;
        info!(
            contact = %name,
            receive_address = ?updated.receive_address(),
            "Set receive address"
        );
        Ok(updated)
    }

    async fn list_keypairs(&self) -> Result<Vec<Keypair>, ContactError> {
        self.emit(Event::ListingKeypairs);
        Ok(self.service.list_keypairs().await?)
    }
}

fn has_keypair(keypairs: &[Keypair], name: &str) -> bool {
    keypairs.iter().any(|k| k.name == name)
}
