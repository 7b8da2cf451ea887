//! Storage service client contract
//!
//! The engine talks to a content-addressed blob store with a mutable naming
//! layer on top (IPFS + IPNS in practice). Every call is asynchronous and is
//! a suspension point for the engine.
//!
//! Two implementations are provided:
//!
//! - [`KuboClient`]: the Kubo RPC API over HTTP
//! - [`MemoryStorageService`]: in-process, for tests and demos

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::error::ServiceError;
use crate::types::ContentAddress;

mod kubo;
mod memory;

pub use kubo::{KuboClient, DEFAULT_API_URL};
pub use memory::{MemoryStorageService, Operation, SELF_KEYPAIR};

/// Content handed to [`StorageService::add_blob`].
#[derive(Debug)]
pub enum Blob {
    /// Already in memory, like an encoded file list
    Bytes(Bytes),
    /// An open local file of `len` bytes, streamed to the service
    File { file: tokio::fs::File, len: u64 },
}

impl Blob {
    pub fn len(&self) -> u64 {
        match self {
            Blob::Bytes(data) => data.len() as u64,
            Blob::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer the whole blob. Only for services that keep blobs in memory.
    pub async fn into_bytes(self) -> Result<Bytes, ServiceError> {
        match self {
            Blob::Bytes(data) => Ok(data),
            Blob::File { mut file, len } => {
                let mut data = Vec::with_capacity(len as usize);
                file.read_to_end(&mut data)
                    .await
                    .map_err(|e| ServiceError::Read(e.to_string()))?;
                Ok(Bytes::from(data))
            }
        }
    }
}

impl From<Bytes> for Blob {
    fn from(data: Bytes) -> Self {
        Blob::Bytes(data)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Blob::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Blob {
    fn from(data: &'static [u8]) -> Self {
        Blob::Bytes(Bytes::from_static(data))
    }
}

/// A signing keypair known to the naming layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// Local alias
    pub name: String,
    /// Publishable identifier derived from the public key
    pub id: String,
}

/// Result of renaming a keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedKeypair {
    pub was: String,
    pub now: String,
    pub id: String,
}

/// Result of pointing a name at a content address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPointer {
    pub name: String,
    pub value: String,
}

/// Algorithm used when generating keypairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum KeyAlgorithm {
    Ed25519,
    Rsa { bits: u32 },
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        KeyAlgorithm::Ed25519
    }
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Rsa { .. } => "rsa",
        }
    }

    /// Key size, for algorithms that take one
    pub fn size(&self) -> Option<u32> {
        match self {
            KeyAlgorithm::Ed25519 => None,
            KeyAlgorithm::Rsa { bits } => Some(*bits),
        }
    }
}

/// Operations the engine needs from the storage service.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store a blob, returning its content address
    async fn add_blob(&self, blob: Blob) -> Result<ContentAddress, ServiceError>;

    /// Read a blob back
    async fn fetch_blob(&self, address: &ContentAddress) -> Result<Bytes, ServiceError>;

    async fn generate_keypair(
        &self,
        name: &str,
        algorithm: KeyAlgorithm,
    ) -> Result<Keypair, ServiceError>;

    async fn list_keypairs(&self) -> Result<Vec<Keypair>, ServiceError>;

    async fn remove_keypair(&self, name: &str) -> Result<Keypair, ServiceError>;

    async fn rename_keypair(&self, old: &str, new: &str) -> Result<RenamedKeypair, ServiceError>;

    /// Point the name owned by `keypair_name` (the node's own key when
    /// `None`) at `address`
    async fn publish_pointer(
        &self,
        address: &ContentAddress,
        keypair_name: Option<&str>,
    ) -> Result<PublishedPointer, ServiceError>;

    /// Follow a name to the content address it currently points at
    async fn resolve_pointer(
        &self,
        name: &str,
        recursive: bool,
    ) -> Result<ContentAddress, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_algorithm_parameters() {
        assert_eq!(KeyAlgorithm::default(), KeyAlgorithm::Ed25519);
        assert_eq!(KeyAlgorithm::Ed25519.size(), None);
        assert_eq!(KeyAlgorithm::Rsa { bits: 2048 }.name(), "rsa");
        assert_eq!(KeyAlgorithm::Rsa { bits: 2048 }.size(), Some(2048));
    }

    #[tokio::test]
    async fn test_file_blob_buffers_whole_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"remember the milk").unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let blob = Blob::File { file, len: 17 };
        assert_eq!(blob.len(), 17);
        assert_eq!(blob.into_bytes().await.unwrap(), Bytes::from_static(b"remember the milk"));

        let blob = Blob::from(Vec::new());
        assert!(blob.is_empty());
    }

    #[test]
    fn test_key_algorithm_serde() {
        let json = serde_json::to_string(&KeyAlgorithm::Rsa { bits: 4096 }).unwrap();
        assert_eq!(json, r#"{"type":"rsa","bits":4096}"#);
        let parsed: KeyAlgorithm = serde_json::from_str(r#"{"type":"ed25519"}"#).unwrap();
        assert_eq!(parsed, KeyAlgorithm::Ed25519);
    }
}
