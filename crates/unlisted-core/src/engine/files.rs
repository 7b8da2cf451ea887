//! Publishing
//!
//! A contact's send list is uploaded as a JSON manifest and the manifest's
//! address is published under the contact's keypair. Stored contacts only
//! change at fixed checkpoints:
//!
//! - `share_files`: after every upload succeeded (merged, not yet republished)
//! - `publish_file_list`: after the manifest upload, before the publish
//! - `unshare_files`: only after the publish succeeded

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, info};

use super::Engine;
use crate::error::FileError;
use crate::events::Event;
use crate::service::Blob;
use crate::types::{Contact, ContentAddress, File, FileList, SendAddress};

/// A local file that passed validation and is ready to upload.
struct Pending {
    path: PathBuf,
    name: String,
    file: tokio::fs::File,
    len: u64,
}

impl Engine {
    // ═══════════════════════════════════════════════════════════════════════
    // File Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Share local files with `contact` and republish their list.
    ///
    /// Every path is checked before anything is uploaded. Files are streamed
    /// to the service concurrently and the first failure fails the whole
    /// call; blobs that did upload are left on the service.
    ///
    /// A name that is already sent to or received from the contact is
    /// rejected, as is a name repeated within `paths`.
    pub async fn share_files(
        &self,
        paths: &[PathBuf],
        contact: &Contact,
    ) -> Result<Contact, FileError> {
        self.try_share_files(paths, contact)
            .await
            .map_err(|e| self.report(e))
    }

    async fn try_share_files(
        &self,
        paths: &[PathBuf],
        contact: &Contact,
    ) -> Result<Contact, FileError> {
        send_address(contact)?;

        let mut names = BTreeSet::new();
        let mut pending = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .ok_or_else(|| FileError::FileDoesNotExist(path.clone()))?
                .to_string_lossy()
                .into_owned();
            let taken = contact.send_list().contains_name(&name)
                || contact.receive_list().contains_name(&name);
            if taken || !names.insert(name.clone()) {
                return Err(FileError::FileAlreadyExists(name));
            }
            let (file, len) = open_regular_file(path).await?;
            pending.push(Pending {
                path: path.clone(),
                name,
                file,
                len,
            });
        }

        let uploads = pending.into_iter().map(|pending| async move {
            self.emit(Event::Uploading {
                path: pending.path.clone(),
            });
            let blob = Blob::File {
                file: pending.file,
                len: pending.len,
            };
            let hash = self.service.add_blob(blob).await?;
            debug!(path = ?pending.path, %hash, size = pending.len, "Uploaded file");
            Ok::<_, FileError>(File::new(pending.name, hash))
        });
        let uploaded = try_join_all(uploads).await?;

        let count = uploaded.len();
        let merged = contact.send_list().merged(uploaded);
        let contact = self.persist(contact.with_send_list(merged))?;
        info!(contact = %contact.display_name(), files = count, "Shared files");

        self.try_publish_file_list(&contact).await
    }

    /// Upload `contact`'s send list and point their send address at it.
    ///
    /// Returns once the naming layer has accepted the new pointer. The new
    /// list address is persisted just before publishing, so a failed publish
    /// still leaves the stored contact naming the uploaded list.
    pub async fn publish_file_list(&self, contact: &Contact) -> Result<Contact, FileError> {
        self.try_publish_file_list(contact)
            .await
            .map_err(|e| self.report(e))
    }

    pub(super) async fn try_publish_file_list(
        &self,
        contact: &Contact,
    ) -> Result<Contact, FileError> {
        let send_address = send_address(contact)?;

        let address = self.upload_file_list(contact, contact.send_list()).await?;
        let contact =
            self.persist(contact.with_send_list(contact.send_list().with_hash(address.clone())))?;

        self.publish(&contact, send_address, &address).await?;
        Ok(contact)
    }

    /// Stop sharing `files` with `contact` and republish their list.
    ///
    /// The stored contact only changes once the new list is published; on
    /// any failure it still holds the previous list.
    pub async fn unshare_files(
        &self,
        files: &[File],
        contact: &Contact,
    ) -> Result<Contact, FileError> {
        self.try_unshare_files(files, contact)
            .await
            .map_err(|e| self.report(e))
    }

    async fn try_unshare_files(
        &self,
        files: &[File],
        contact: &Contact,
    ) -> Result<Contact, FileError> {
        let send_address = send_address(contact)?;
        if !files.iter().any(|f| contact.send_list().contains(f)) {
            return Err(FileError::FileNotShared);
        }

        let remaining = contact.send_list().without(files);
        let address = self.upload_file_list(contact, &remaining).await?;
        self.publish(contact, send_address, &address).await?;

        let contact = self.persist(contact.with_send_list(remaining.with_hash(address)))?;
        info!(
            contact = %contact.display_name(),
            files = contact.send_list().len(),
            "Unshared files"
        );
        Ok(contact)
    }

    /// Copy a shared file out of blob storage.
    ///
    /// A directory `destination` receives the file under its own name.
    /// Returns the path written.
    pub async fn fetch_file(&self, file: &File, destination: &Path) -> Result<PathBuf, FileError> {
        self.try_fetch_file(file, destination)
            .await
            .map_err(|e| self.report(e))
    }

    async fn try_fetch_file(&self, file: &File, destination: &Path) -> Result<PathBuf, FileError> {
        let hash = file.hash.as_ref().ok_or(FileError::FileHashNotSet)?;

        // Names come from other people's lists; never let one leave the directory
        let target = if destination.is_dir() {
            let name = Path::new(&file.name)
                .file_name()
                .ok_or_else(|| FileError::FileDoesNotExist(PathBuf::from(&file.name)))?;
            destination.join(name)
        } else {
            destination.to_path_buf()
        };

        self.emit(Event::FetchingFile { hash: hash.clone() });
        let data = self.service.fetch_blob(hash).await?;
        tokio::fs::write(&target, &data).await?;
        info!(file = %file.name, path = ?target, size = data.len(), "Fetched file");
        Ok(target)
    }

    async fn upload_file_list(
        &self,
        contact: &Contact,
        list: &FileList,
    ) -> Result<ContentAddress, FileError> {
        let encoded = list
            .encode()
            .map_err(|_| FileError::FailedToEncodeFileList)?;

        self.emit(Event::UploadingFileList {
            contact: contact.clone(),
        });
        let address = self.service.add_blob(Blob::from(encoded)).await?;
        debug!(contact = %contact.display_name(), %address, "Uploaded file list");
        Ok(address)
    }

    async fn publish(
        &self,
        contact: &Contact,
        send_address: &SendAddress,
        address: &ContentAddress,
    ) -> Result<(), FileError> {
        self.emit(Event::Publishing {
            contact: contact.clone(),
        });
        let published = self
            .service
            .publish_pointer(address, Some(&send_address.keypair_name))
            .await?;
        debug!(
            contact = %contact.display_name(),
            name = %published.name,
            value = %published.value,
            "Published file list"
        );
        Ok(())
    }
}

fn send_address(contact: &Contact) -> Result<&SendAddress, FileError> {
    contact.send_address().ok_or(FileError::SendAddressNotSet)
}

/// Open `path`, which must be a regular file, and return it with its size.
async fn open_regular_file(path: &Path) -> Result<(tokio::fs::File, u64), FileError> {
    let missing = || FileError::FileDoesNotExist(path.to_path_buf());
    let file = tokio::fs::File::open(path).await.map_err(|_| missing())?;
    let metadata = file.metadata().await.map_err(|_| missing())?;
    if !metadata.is_file() {
        return Err(missing());
    }
    Ok((file, metadata.len()))
}
