use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::{RemoteError, RemoteResult};
use super::types::{ByteStream, FileHandle, FileKind, RemoteStore};

const DEFAULT_ROOT_FOLDER: &str = "TaalSync";
// Folder alias the API accepts for the account root.
const ACCOUNT_ROOT: &str = "root";
const MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Supplies bearer tokens for the remote store. `refresh` is called at
/// most once per request, after the server rejects the current token.
pub trait TokenProvider: Send + Sync {
    fn initial(&self) -> String;
    async fn refresh(&self) -> RemoteResult<String>;
}

/// A fixed token with no refresh flow, e.g. from `TAALSYNC_TOKEN`.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn initial(&self) -> String {
        self.0.clone()
    }

    async fn refresh(&self) -> RemoteResult<String> {
        Err(RemoteError::Auth {
            message: "token rejected and no refresh flow is configured".to_string(),
        })
    }
}

/// [`RemoteStore`] over a drive-shaped REST API.
///
/// Transient failures (network, rate limiting) are retried with
/// exponential backoff; a rejected token triggers a single refresh.
pub struct HttpRemoteStore<P: TokenProvider = StaticToken> {
    client: Client,
    base_url: String,
    root_folder_name: String,
    token: RwLock<String>,
    provider: P,
}

#[derive(Deserialize)]
struct ListResponse {
    files: Vec<FileHandle>,
}

impl<P: TokenProvider> HttpRemoteStore<P> {
    pub fn new(base_url: impl Into<String>, provider: P) -> Self {
        let token = provider.initial();
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            root_folder_name: DEFAULT_ROOT_FOLDER.to_string(),
            token: RwLock::new(token),
            provider,
        }
    }

    pub fn with_root_folder(mut self, name: impl Into<String>) -> Self {
        self.root_folder_name = name.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with the current bearer token. Retries transient
    /// failures with backoff and refreshes the token once on rejection.
    async fn send_authorized<B>(&self, entity: &str, id: &str, build: B) -> RemoteResult<Response>
    where
        B: Fn(&Client, &str) -> RequestBuilder,
    {
        let mut refreshed = false;
        let mut attempt: u32 = 0;
        loop {
            let token = self.token.read().await.clone();
            let err = match build(&self.client, &token).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    status_to_error(status, entity, id, &body)
                }
                Err(e) => RemoteError::from(e),
            };
            match err {
                RemoteError::Auth { .. } if !refreshed => {
                    refreshed = true;
                    warn!("remote store rejected token, refreshing");
                    let fresh = self.provider.refresh().await?;
                    *self.token.write().await = fresh;
                }
                e if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    debug!(attempt, ?delay, error = %e, "retrying remote request");
                    tokio::time::sleep(delay).await;
                }
                e => return Err(e),
            }
        }
    }

    async fn find_in_folder(
        &self,
        folder_id: &str,
        name: &str,
    ) -> RemoteResult<Option<FileHandle>> {
        let entries = self.list(folder_id, Some(FileKind::File)).await?;
        Ok(entries.into_iter().find(|f| f.name == name))
    }
}

impl<P: TokenProvider> RemoteStore for HttpRemoteStore<P> {
    async fn list(
        &self,
        folder_id: &str,
        kind: Option<FileKind>,
    ) -> RemoteResult<Vec<FileHandle>> {
        let url = self.url("/files");
        let kind_param = kind.map(|k| match k {
            FileKind::Folder => "folder",
            FileKind::File => "file",
        });
        let resp = self
            .send_authorized("folder", folder_id, |client, token| {
                let mut req = client
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("parent", folder_id)]);
                if let Some(k) = kind_param {
                    req = req.query(&[("kind", k)]);
                }
                req
            })
            .await?;
        let listing: ListResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::protocol(format!("invalid file listing: {e}")))?;
        Ok(listing.files)
    }

    async fn download_bytes(&self, file_id: &str) -> RemoteResult<Vec<u8>> {
        let url = self.url(&format!("/files/{file_id}/content"));
        let resp = self
            .send_authorized("file", file_id, |client, token| {
                client.get(&url).bearer_auth(token)
            })
            .await?;
        let body = resp.bytes().await?;
        Ok(body.to_vec())
    }

    async fn download_stream(
        &self,
        file_id: &str,
        range_start: Option<u64>,
    ) -> RemoteResult<(ByteStream, u64)> {
        let url = self.url(&format!("/files/{file_id}/content"));
        let resp = self
            .send_authorized("file", file_id, |client, token| {
                let req = client.get(&url).bearer_auth(token);
                match range_start {
                    Some(offset) => req.header(reqwest::header::RANGE, format!("bytes={offset}-")),
                    None => req,
                }
            })
            .await?;

        let total = if resp.status() == StatusCode::PARTIAL_CONTENT {
            resp.headers()
                .get(reqwest::header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
                .ok_or_else(|| RemoteError::protocol("partial response without content range"))?
        } else if range_start.is_some_and(|offset| offset > 0) {
            // The caller would append a full body after its offset.
            return Err(RemoteError::protocol("server ignored byte range request"));
        } else {
            resp.content_length()
                .ok_or_else(|| RemoteError::protocol("missing content length"))?
        };

        let stream = resp.bytes_stream().map_err(RemoteError::from).boxed();
        Ok((stream, total))
    }

    async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> RemoteResult<FileHandle> {
        // Replace-by-name: update in place when the file already exists.
        let existing = self.find_in_folder(folder_id, name).await?;
        let url = match &existing {
            Some(file) => self.url(&format!("/files/{}/content", file.id)),
            None => self.url("/files"),
        };
        let resp = self
            .send_authorized("file", name, |client, token| {
                let req = match &existing {
                    Some(_) => client.put(&url),
                    None => client
                        .post(&url)
                        .query(&[("parent", folder_id), ("name", name)]),
                };
                req.bearer_auth(token)
                    .header(reqwest::header::CONTENT_TYPE, mime_type)
                    .body(content.clone())
            })
            .await?;
        resp.json()
            .await
            .map_err(|e| RemoteError::protocol(format!("invalid upload response: {e}")))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> RemoteResult<FileHandle> {
        let url = self.url("/folders");
        let body = serde_json::json!({
            "name": name,
            "parent": parent_id,
        });
        let resp = self
            .send_authorized("folder", name, |client, token| {
                client.post(&url).bearer_auth(token).json(&body)
            })
            .await?;
        resp.json()
            .await
            .map_err(|e| RemoteError::protocol(format!("invalid folder response: {e}")))
    }

    async fn get_or_create_root_folder(&self) -> RemoteResult<String> {
        let folders = self.list(ACCOUNT_ROOT, Some(FileKind::Folder)).await?;
        if let Some(found) = pick_root(&folders, &self.root_folder_name) {
            return Ok(found.id.clone());
        }
        let created = self
            .create_folder(ACCOUNT_ROOT, &self.root_folder_name)
            .await?;
        // Another client may have created the folder concurrently; re-list
        // so every client converges on the same winner.
        let folders = self.list(ACCOUNT_ROOT, Some(FileKind::Folder)).await?;
        Ok(pick_root(&folders, &self.root_folder_name)
            .map(|f| f.id.clone())
            .unwrap_or(created.id))
    }
}

/// Deterministic winner among same-named root folders: smallest id.
pub(super) fn pick_root<'a>(folders: &'a [FileHandle], name: &str) -> Option<&'a FileHandle> {
    folders
        .iter()
        .filter(|f| f.is_folder && f.name == name)
        .min_by(|a, b| a.id.cmp(&b.id))
}

/// Total size from a `Content-Range: bytes start-end/total` header.
pub(super) fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().strip_prefix("bytes ")?.rsplit_once('/')?;
    total.parse().ok()
}

pub(super) fn status_to_error(
    status: StatusCode,
    entity: &str,
    id: &str,
    body: &str,
) -> RemoteError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth { message },
        StatusCode::FORBIDDEN => RemoteError::Permission { message },
        StatusCode::NOT_FOUND => RemoteError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => RemoteError::Quota { message },
        s if s.is_server_error() => RemoteError::Network { message },
        _ => RemoteError::protocol(message),
    }
}
