//! Unlisted Core Library
//!
//! Private file sharing between contacts over a content-addressed store.
//!
//! ## Overview
//!
//! Every contact gets a dedicated keypair on the storage service. The files
//! we share with a contact are uploaded as blobs, listed in a JSON manifest,
//! and the manifest's address is published under that keypair. The contact
//! resolves the keypair's public name to read the list; we do the same with
//! the address they give us to read what they share with us.
//!
//! ## Core Pieces
//!
//! - **[`Engine`]**: contact lifecycle, publishing and sync
//! - **[`StorageService`]**: blobs plus a mutable naming layer (Kubo, or in memory)
//! - **[`ContactStore`]**: durable contact records (redb)
//! - **[`Event`]**: progress and error notifications over a broadcast channel
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use unlisted_core::{Config, Engine, KuboClient, Storage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("~/.unlisted")?;
//!     let service = KuboClient::new(&config.api_url, config.request_timeout())?;
//!     let store = Storage::open_in("~/.unlisted")?;
//!     let engine = Engine::new(Arc::new(service), Arc::new(store), config);
//!
//!     let alice = engine.add_contact("Alice").await?;
//!     engine.share_files(&["report.pdf".into()], &alice).await?;
//!
//!     for state in engine.sync().await? {
//!         println!("{}: {}", state.contact().display_name(), state);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod service;
pub mod storage;
pub mod types;

// Re-exports
pub use config::{default_data_dir, Config};
pub use engine::{Engine, SyncState};
pub use error::{
    ContactError, DaemonError, EngineError, FileError, ServiceError, StoreError, SyncError,
};
pub use events::Event;
pub use service::{
    Blob, KeyAlgorithm, Keypair, KuboClient, MemoryStorageService, Operation, StorageService,
};
pub use storage::{ContactStore, Storage};
pub use types::*;
