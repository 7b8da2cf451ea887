//! In-process storage service
//!
//! Content-addressed (BLAKE3, base58) blob storage with an ed25519-keyed
//! naming layer, all held in memory. Several engines may share one instance
//! to exchange file lists without a daemon. Individual operations can be
//! made to fail, and every call is counted, so tests can assert on what the
//! engine did and did not ask for.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::SigningKey;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::{Blob, KeyAlgorithm, Keypair, PublishedPointer, RenamedKeypair, StorageService};
use crate::error::ServiceError;
use crate::types::ContentAddress;

/// Name of the keypair every node starts with
pub const SELF_KEYPAIR: &str = "self";

/// Upper bound on pointer hops during recursive resolution
const MAX_RESOLVE_DEPTH: usize = 32;

/// One storage service call, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddBlob,
    FetchBlob,
    GenerateKeypair,
    ListKeypairs,
    RemoveKeypair,
    RenameKeypair,
    PublishPointer,
    ResolvePointer,
}

#[derive(Default)]
struct State {
    blobs: HashMap<ContentAddress, Bytes>,
    /// keypair name -> id
    keypairs: BTreeMap<String, String>,
    /// name -> current value (a content address or another name)
    pointers: HashMap<String, String>,
    failing: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
}

/// Storage service that lives entirely in memory.
pub struct MemoryStorageService {
    state: Mutex<State>,
}

impl std::fmt::Debug for MemoryStorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStorageService")
            .field("blobs", &state.blobs.len())
            .field("keypairs", &state.keypairs.len())
            .field("pointers", &state.pointers.len())
            .finish()
    }
}

impl Default for MemoryStorageService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageService {
    /// Create an empty service holding only the node's own keypair.
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .keypairs
            .insert(SELF_KEYPAIR.to_string(), generate_keypair_id());
        Self {
            state: Mutex::new(state),
        }
    }

    /// Make every subsequent call of `operation` fail as unavailable.
    pub fn fail(&self, operation: Operation) {
        self.state.lock().failing.insert(operation);
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, operation: Operation) {
        self.state.lock().failing.remove(&operation);
    }

    /// How many times `operation` has been called, failed calls included.
    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Look a keypair up by name without counting a call.
    pub fn keypair(&self, name: &str) -> Option<Keypair> {
        self.state.lock().keypairs.get(name).map(|id| Keypair {
            name: name.to_string(),
            id: id.clone(),
        })
    }

    /// Point `name` at another name, forming a chain that only recursive
    /// resolution follows.
    pub fn link(&self, name: &str, target: &str) {
        self.state
            .lock()
            .pointers
            .insert(name.to_string(), target.to_string());
    }

    /// Count a call and hand out the state unless the operation is failing.
    fn enter(&self, operation: Operation) -> Result<MutexGuard<'_, State>, ServiceError> {
        let mut state = self.state.lock();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(&operation) {
            return Err(ServiceError::Unavailable(format!("{:?} is failing", operation)));
        }
        Ok(state)
    }
}

#[async_trait]
impl StorageService for MemoryStorageService {
    async fn add_blob(&self, blob: Blob) -> Result<ContentAddress, ServiceError> {
        drop(self.enter(Operation::AddBlob)?);
        let data = blob.into_bytes().await?;
        let mut state = self.state.lock();
        let address =
            ContentAddress::new(bs58::encode(blake3::hash(&data).as_bytes()).into_string());
        debug!(%address, size = data.len(), "Stored blob");
        state.blobs.insert(address.clone(), data);
        Ok(address)
    }

    async fn fetch_blob(&self, address: &ContentAddress) -> Result<Bytes, ServiceError> {
        let state = self.enter(Operation::FetchBlob)?;
        state
            .blobs
            .get(address)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(address.to_string()))
    }

    async fn generate_keypair(
        &self,
        name: &str,
        _algorithm: KeyAlgorithm,
    ) -> Result<Keypair, ServiceError> {
        let mut state = self.enter(Operation::GenerateKeypair)?;
        if state.keypairs.contains_key(name) {
            return Err(ServiceError::KeypairExists(name.to_string()));
        }
        let id = generate_keypair_id();
        state.keypairs.insert(name.to_string(), id.clone());
        Ok(Keypair {
            name: name.to_string(),
            id,
        })
    }

    async fn list_keypairs(&self) -> Result<Vec<Keypair>, ServiceError> {
        let state = self.enter(Operation::ListKeypairs)?;
        Ok(state
            .keypairs
            .iter()
            .map(|(name, id)| Keypair {
                name: name.clone(),
                id: id.clone(),
            })
            .collect())
    }

    async fn remove_keypair(&self, name: &str) -> Result<Keypair, ServiceError> {
        let mut state = self.enter(Operation::RemoveKeypair)?;
        if name == SELF_KEYPAIR {
            return Err(ServiceError::Api {
                status: 500,
                message: "cannot remove key with name 'self'".into(),
            });
        }
        let id = state
            .keypairs
            .remove(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
        Ok(Keypair {
            name: name.to_string(),
            id,
        })
    }

    async fn rename_keypair(&self, old: &str, new: &str) -> Result<RenamedKeypair, ServiceError> {
        let mut state = self.enter(Operation::RenameKeypair)?;
        if state.keypairs.contains_key(new) {
            return Err(ServiceError::KeypairExists(new.to_string()));
        }
        let id = state
            .keypairs
            .remove(old)
            .ok_or_else(|| ServiceError::NotFound(old.to_string()))?;
        state.keypairs.insert(new.to_string(), id.clone());
        Ok(RenamedKeypair {
            was: old.to_string(),
            now: new.to_string(),
            id,
        })
    }

    async fn publish_pointer(
        &self,
        address: &ContentAddress,
        keypair_name: Option<&str>,
    ) -> Result<PublishedPointer, ServiceError> {
        let mut state = self.enter(Operation::PublishPointer)?;
        let keypair_name = keypair_name.unwrap_or(SELF_KEYPAIR);
        let id = state
            .keypairs
            .get(keypair_name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(keypair_name.to_string()))?;
        state.pointers.insert(id.clone(), address.to_string());
        Ok(PublishedPointer {
            name: id,
            value: format!("/ipfs/{}", address),
        })
    }

    async fn resolve_pointer(
        &self,
        name: &str,
        recursive: bool,
    ) -> Result<ContentAddress, ServiceError> {
        let state = self.enter(Operation::ResolvePointer)?;
        let name = name.strip_prefix("/ipns/").unwrap_or(name);
        let mut value = state
            .pointers
            .get(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;
        if recursive {
            for _ in 0..MAX_RESOLVE_DEPTH {
                match state.pointers.get(value.as_str()) {
                    Some(next) => value = next,
                    None => return Ok(ContentAddress::new(value.clone())),
                }
            }
            return Err(ServiceError::Api {
                status: 500,
                message: format!("could not resolve {}: recursion limit exceeded", name),
            });
        }
        Ok(ContentAddress::new(value.clone()))
    }
}

/// A fresh ed25519 public key, base58 encoded.
fn generate_keypair_id() -> String {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).expect("Failed to get random bytes");
    let key = SigningKey::from_bytes(&seed);
    format!("k{}", bs58::encode(key.verifying_key().to_bytes()).into_string())
}
