//! Error types for Unlisted
//!
//! Errors are partitioned by the operation family that raised them. Each
//! family is a closed set of reasons plus an `Unknown` case that wraps the
//! underlying transport or storage failure.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::types::ContentAddress;

/// Underlying cause carried by the `Unknown` variants.
///
/// Held in an `Arc` so that classified errors stay `Clone` and can travel
/// over the event channel.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from the storage service client (blobs and naming).
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// The request never produced a response (connection refused, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("storage service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Blob, keypair or pointer is unknown to the service
    #[error("not found: {0}")]
    NotFound(String),

    /// A keypair with the requested name already exists
    #[error("keypair already exists: {0}")]
    KeypairExists(String),

    /// The response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The configured API URL is unusable
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// The service is unreachable
    #[error("storage service unavailable: {0}")]
    Unavailable(String),

    /// A local blob could not be read while sending it
    #[error("failed to read blob: {0}")]
    Read(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Http(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::InvalidUrl(err.to_string())
    }
}

/// Errors from the persistent contact store (redb).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by add/remove/rename and other contact operations.
#[derive(Error, Debug, Clone)]
pub enum ContactError {
    #[error("contact already exists")]
    ContactAlreadyExists,

    #[error("contact does not exist")]
    ContactDoesNotExist,

    #[error("contact operation failed: {0}")]
    Unknown(#[source] Cause),
}

/// Errors raised by share/unshare/publish and file retrieval.
#[derive(Error, Debug, Clone)]
pub enum FileError {
    #[error("file has no content hash")]
    FileHashNotSet,

    #[error("contact has no send address")]
    SendAddressNotSet,

    #[error("file does not exist: {}", .0.display())]
    FileDoesNotExist(PathBuf),

    #[error("a file named {0:?} already exists for this contact")]
    FileAlreadyExists(String),

    #[error("none of the files are shared with this contact")]
    FileNotShared,

    #[error("failed to encode file list")]
    FailedToEncodeFileList,

    #[error("file operation failed: {0}")]
    Unknown(#[source] Cause),
}

/// Errors reported per contact by `sync`.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("failed to retrieve shared file list")]
    FailedToRetrieveSharedFileList,

    #[error("receive address not set")]
    ReceiveAddressNotSet,

    #[error("invalid JSON for object {0}")]
    InvalidJsonForObject(ContentAddress),

    #[error("sync failed: {0}")]
    Unknown(#[source] Cause),
}

/// Errors raised while initialising or altering local daemon configuration.
#[derive(Error, Debug, Clone)]
pub enum DaemonError {
    #[error("initialisation failed: {0}")]
    InitFailed(#[source] Cause),

    #[error("failed to alter config file: {0}")]
    FailedToAlterConfigFile(#[source] Cause),

    #[error("daemon operation failed: {0}")]
    Unknown(#[source] Cause),
}

/// Any classified error, as carried by [`crate::Event::Error`].
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Contact(#[from] ContactError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

impl EngineError {
    /// The underlying failure behind an `Unknown` case.
    ///
    /// Use `downcast_ref` on it to tell a [`ServiceError`] from a
    /// [`StoreError`].
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            EngineError::Contact(ContactError::Unknown(cause))
            | EngineError::File(FileError::Unknown(cause))
            | EngineError::Sync(SyncError::Unknown(cause))
            | EngineError::Daemon(DaemonError::Unknown(cause)) => Some(cause),
            _ => None,
        }
    }

    /// True when the error wraps an unclassified underlying failure.
    pub fn is_unknown(&self) -> bool {
        self.cause().is_some()
    }
}

/// Map foreign errors into a family's `Unknown` case so `?` works at the
/// operation boundary.
macro_rules! wrap_unknown {
    ($family:ident: $($source:ty),+) => {
        $(
            impl From<$source> for $family {
                fn from(err: $source) -> Self {
                    $family::Unknown(Arc::new(err))
                }
            }
        )+
    };
}

wrap_unknown!(ContactError: ServiceError, StoreError);
wrap_unknown!(FileError: ServiceError, StoreError, std::io::Error);
wrap_unknown!(SyncError: ServiceError, StoreError);
wrap_unknown!(DaemonError: std::io::Error, serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FileError::FileAlreadyExists("report.pdf".to_string());
        assert_eq!(
            format!("{}", err),
            "a file named \"report.pdf\" already exists for this contact"
        );

        let err = SyncError::InvalidJsonForObject(ContentAddress::new("bafy"));
        assert_eq!(format!("{}", err), "invalid JSON for object bafy");
    }

    #[test]
    fn test_service_error_wraps_as_unknown() {
        let err: ContactError = ServiceError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, ContactError::Unknown(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_wraps_as_unknown_file_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: FileError = io_err.into();
        assert!(matches!(err, FileError::Unknown(_)));
    }

    #[test]
    fn test_engine_error_is_unknown() {
        let known: EngineError = ContactError::ContactDoesNotExist.into();
        assert!(!known.is_unknown());

        let unknown: EngineError =
            FileError::from(ServiceError::Http("timed out".into())).into();
        assert!(unknown.is_unknown());
        assert!(matches!(
            unknown.cause().and_then(|c| c.downcast_ref::<ServiceError>()),
            Some(ServiceError::Http(_))
        ));
    }
}
