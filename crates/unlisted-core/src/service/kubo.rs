//! Kubo RPC client
//!
//! Speaks the `/api/v0` HTTP API exposed by a local Kubo (go-ipfs) daemon.
//! Every RPC is a POST with its arguments in the query string; `add` sends
//! the blob as a multipart form, streaming local files straight from disk.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use super::{Blob, KeyAlgorithm, Keypair, PublishedPointer, RenamedKeypair, StorageService};
use crate::error::ServiceError;
use crate::types::ContentAddress;

/// Default Kubo RPC endpoint
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

const IPFS_PREFIX: &str = "/ipfs/";

/// HTTP client for a Kubo daemon.
#[derive(Clone)]
pub struct KuboClient {
    base_url: Url,
    http: Client,
}

impl std::fmt::Debug for KuboClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KuboClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl KuboClient {
    /// Create a client for the daemon at `api_url` (e.g. `http://127.0.0.1:5001`).
    pub fn new(api_url: impl AsRef<str>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_http_client(api_url, http)
    }

    /// Use an existing reqwest client.
    pub fn with_http_client(api_url: impl AsRef<str>, http: Client) -> Result<Self, ServiceError> {
        let mut url = Url::parse(api_url.as_ref())
            .map_err(|_| ServiceError::InvalidUrl(api_url.as_ref().to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(api_url.as_ref().to_string()));
        }
        let mut path = url.path().trim_end_matches('/').to_owned();
        if !path.ends_with("/api/v0") {
            path.push_str("/api/v0");
        }
        path.push('/');
        url.set_path(&path);
        Ok(Self {
            base_url: url,
            http,
        })
    }

    /// The resolved `/api/v0/` base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, command: &str, args: &[(&str, &str)]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.join(command)?;
        if !args.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in args {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn post(&self, command: &str, args: &[(&str, &str)]) -> Result<Response, ServiceError> {
        let url = self.endpoint(command, args)?;
        debug!(%url, "Kubo RPC");
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await
    }

    async fn post_json<T>(&self, command: &str, args: &[(&str, &str)]) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
    {
        let response = self.post(command, args).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl StorageService for KuboClient {
    async fn add_blob(&self, blob: Blob) -> Result<ContentAddress, ServiceError> {
        let url = self.endpoint("add", &[("pin", "true"), ("quieter", "true")])?;
        let len = blob.len();
        let body = match blob {
            Blob::Bytes(data) => Body::from(data),
            Blob::File { file, .. } => Body::wrap_stream(ReaderStream::new(file)),
        };
        let part = Part::stream_with_length(body, len).file_name("blob");
        let form = Form::new().part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;
        let added: AddResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        Ok(ContentAddress::new(added.hash))
    }

    async fn fetch_blob(&self, address: &ContentAddress) -> Result<Bytes, ServiceError> {
        let response = self.post("cat", &[("arg", address.as_str())]).await?;
        response.bytes().await.map_err(map_transport_error)
    }

    async fn generate_keypair(
        &self,
        name: &str,
        algorithm: KeyAlgorithm,
    ) -> Result<Keypair, ServiceError> {
        let size = algorithm.size().map(|bits| bits.to_string());
        let mut args = vec![("arg", name), ("type", algorithm.name())];
        if let Some(size) = size.as_deref() {
            args.push(("size", size));
        }
        let key: KeyResponse = self.post_json("key/gen", &args).await?;
        Ok(key.into())
    }

    async fn list_keypairs(&self) -> Result<Vec<Keypair>, ServiceError> {
        let list: KeyListResponse = self.post_json("key/list", &[]).await?;
        Ok(list.keys.into_iter().map(Keypair::from).collect())
    }

    async fn remove_keypair(&self, name: &str) -> Result<Keypair, ServiceError> {
        let list: KeyListResponse = self.post_json("key/rm", &[("arg", name)]).await?;
        list.keys
            .into_iter()
            .next()
            .map(Keypair::from)
            .ok_or_else(|| ServiceError::InvalidResponse("key/rm returned no keys".into()))
    }

    async fn rename_keypair(&self, old: &str, new: &str) -> Result<RenamedKeypair, ServiceError> {
        let renamed: RenameResponse = self
            .post_json("key/rename", &[("arg", old), ("arg", new)])
            .await?;
        Ok(RenamedKeypair {
            was: renamed.was,
            now: renamed.now,
            id: renamed.id,
        })
    }

    async fn publish_pointer(
        &self,
        address: &ContentAddress,
        keypair_name: Option<&str>,
    ) -> Result<PublishedPointer, ServiceError> {
        let path = format!("{}{}", IPFS_PREFIX, address);
        let mut args = vec![("arg", path.as_str())];
        if let Some(key) = keypair_name {
            args.push(("key", key));
        }
        let published: PublishResponse = self.post_json("name/publish", &args).await?;
        Ok(PublishedPointer {
            name: published.name,
            value: published.value,
        })
    }

    async fn resolve_pointer(
        &self,
        name: &str,
        recursive: bool,
    ) -> Result<ContentAddress, ServiceError> {
        let recursive = if recursive { "true" } else { "false" };
        let resolved: ResolveResponse = self
            .post_json("name/resolve", &[("arg", name), ("recursive", recursive)])
            .await?;
        parse_ipfs_path(&resolved.path)
    }
}

/// Strip the `/ipfs/` prefix from a resolved path.
fn parse_ipfs_path(path: &str) -> Result<ContentAddress, ServiceError> {
    match path.strip_prefix(IPFS_PREFIX) {
        Some(cid) if !cid.is_empty() => Ok(ContentAddress::new(cid.trim_end_matches('/'))),
        _ => Err(ServiceError::InvalidResponse(format!(
            "expected an /ipfs/ path, got {:?}",
            path
        ))),
    }
}

fn map_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_connect() {
        ServiceError::Unavailable(err.to_string())
    } else {
        ServiceError::Http(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let bytes = response.bytes().await.unwrap_or_default();
    Err(map_api_error(status.as_u16(), &bytes))
}

fn map_api_error(status: u16, body: &[u8]) -> ServiceError {
    let message = serde_json::from_slice::<ApiErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
    if message.contains("not found") || message.contains("no key") {
        ServiceError::NotFound(message)
    } else if message.contains("already exists") {
        ServiceError::KeypairExists(message)
    } else {
        ServiceError::Api { status, message }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyResponse {
    name: String,
    id: String,
}

impl From<KeyResponse> for Keypair {
    fn from(key: KeyResponse) -> Self {
        Keypair {
            name: key.name,
            id: key.id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyListResponse {
    #[serde(default)]
    keys: Vec<KeyResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RenameResponse {
    was: String,
    now: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublishResponse {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResolveResponse {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> KuboClient {
        KuboClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_gets_api_prefix() {
        assert_eq!(
            client("http://127.0.0.1:5001").base_url().as_str(),
            "http://127.0.0.1:5001/api/v0/"
        );
        assert_eq!(
            client("http://127.0.0.1:5001/api/v0/").base_url().as_str(),
            "http://127.0.0.1:5001/api/v0/"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            KuboClient::new("not a url", Duration::from_secs(5)),
            Err(ServiceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_repeats_args() {
        let url = client(DEFAULT_API_URL)
            .endpoint("key/rename", &[("arg", "unlisted.Alice"), ("arg", "unlisted.Alicia")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:5001/api/v0/key/rename?arg=unlisted.Alice&arg=unlisted.Alicia"
        );
    }

    #[test]
    fn test_parse_ipfs_path() {
        assert_eq!(
            parse_ipfs_path("/ipfs/bafyabc").unwrap(),
            ContentAddress::new("bafyabc")
        );
        assert!(parse_ipfs_path("/ipns/k51abc").is_err());
        assert!(parse_ipfs_path("/ipfs/").is_err());
    }

    #[test]
    fn test_responses_deserialize() {
        let list: KeyListResponse = serde_json::from_str(
            r#"{"Keys":[{"Name":"self","Id":"k51self"},{"Name":"unlisted.Alice","Id":"k51alice"}]}"#,
        )
        .unwrap();
        assert_eq!(list.keys.len(), 2);
        assert_eq!(Keypair::from(list.keys.into_iter().nth(1).unwrap()).id, "k51alice");

        let renamed: RenameResponse = serde_json::from_str(
            r#"{"Was":"unlisted.Alice","Now":"unlisted.Alicia","Id":"k51alice","Overwrite":false}"#,
        )
        .unwrap();
        assert_eq!(renamed.now, "unlisted.Alicia");
    }

    #[test]
    fn test_api_errors_are_classified() {
        let body = br#"{"Message":"no key by the given name was found","Code":0,"Type":"error"}"#;
        assert!(matches!(map_api_error(500, body), ServiceError::NotFound(_)));

        let body = br#"{"Message":"key with name 'unlisted.Bob' already exists","Code":0}"#;
        assert!(matches!(map_api_error(500, body), ServiceError::KeypairExists(_)));

        assert!(matches!(
            map_api_error(502, b"bad gateway"),
            ServiceError::Api { status: 502, .. }
        ));
    }
}
