/**
 * Remote API Client
 *
 * The remote side of synchronization: three idempotent-on-retry endpoints
 * that accept a checklist completion, a photo upload, or a comment. The
 * synchronizer only talks to the `RemoteApi` trait; `HttpRemoteApi` is the
 * reqwest binding used by the agent.
 *
 * Endpoints (relative to the configured base URL):
 *
 * - `POST /api/sync/checklist` - JSON `ChecklistPayload`
 * - `POST /api/sync/photo`     - multipart: `checklist_item_id` + `file`
 * - `POST /api/sync/comment`   - JSON `CommentPayload`
 * - `GET  /api/health`         - connectivity probe
 */

use crate::client::config::Config;
use crate::client::error::DispatchError;
use crate::shared::{ChecklistPayload, CommentPayload, MutationPayload, PhotoPayload};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;

pub const CHECKLIST_PATH: &str = "/api/sync/checklist";
pub const PHOTO_PATH: &str = "/api/sync/photo";
pub const COMMENT_PATH: &str = "/api/sync/comment";
pub const HEALTH_PATH: &str = "/api/health";

/// The remote collaborator mutations are dispatched to
///
/// Implementations must tolerate receiving the same mutation more than once;
/// the sync core delivers at least once.
pub trait RemoteApi: Send + Sync {
    fn sync_checklist<'a>(
        &'a self,
        payload: &'a ChecklistPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;

    fn upload_photo<'a>(&'a self, photo: &'a PhotoPayload)
        -> BoxFuture<'a, Result<(), DispatchError>>;

    fn sync_comment<'a>(
        &'a self,
        payload: &'a CommentPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;

    /// Whether the remote is reachable right now
    fn ping(&self) -> BoxFuture<'_, bool> {
        async { true }.boxed()
    }
}

/// Route a payload to the endpoint for its kind
pub fn dispatch<'a>(
    api: &'a dyn RemoteApi,
    payload: &'a MutationPayload,
) -> BoxFuture<'a, Result<(), DispatchError>> {
    match payload {
        MutationPayload::Checklist(checklist) => api.sync_checklist(checklist),
        MutationPayload::Photo(photo) => api.upload_photo(photo),
        MutationPayload::Comment(comment) => api.sync_comment(comment),
    }
}

/// reqwest binding of `RemoteApi`
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    config: Config,
}

impl HttpRemoteApi {
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Use a preconfigured client (proxies, custom TLS roots)
    pub fn with_client(config: Config, client: Client) -> Self {
        Self { client, config }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.get_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), DispatchError> {
        let url = self.config.api_url(path);
        let request = self.authorized(self.client.post(&url).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::network(e.to_string()))?;
        check_status(response).await
    }

    async fn post_photo(&self, photo: &PhotoPayload) -> Result<(), DispatchError> {
        let bytes = tokio::fs::read(&photo.local_path).await.map_err(|e| {
            DispatchError::payload(format!(
                "cannot read photo {}: {}",
                photo.local_path.display(),
                e
            ))
        })?;

        let part = Part::bytes(bytes)
            .file_name(photo.file_name.clone())
            .mime_str(&photo.content_type)
            .map_err(|e| DispatchError::payload(format!("invalid content type: {}", e)))?;
        let form = Form::new()
            .text("checklist_item_id", photo.checklist_item_id.clone())
            .part("file", part);

        let url = self.config.api_url(PHOTO_PATH);
        let request = self.authorized(self.client.post(&url).multipart(form));
        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::network(e.to_string()))?;
        check_status(response).await
    }

    async fn get_health(&self) -> bool {
        let url = self.config.api_url(HEALTH_PATH);
        match self.authorized(self.client.get(&url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }
}

async fn check_status(response: Response) -> Result<(), DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    };
    Err(DispatchError::rejected(status.as_u16(), message))
}

impl RemoteApi for HttpRemoteApi {
    fn sync_checklist<'a>(
        &'a self,
        payload: &'a ChecklistPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.post_json(CHECKLIST_PATH, payload).boxed()
    }

    fn upload_photo<'a>(&'a self, photo: &'a PhotoPayload) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.post_photo(photo).boxed()
    }

    fn sync_comment<'a>(
        &'a self,
        payload: &'a CommentPayload,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        self.post_json(COMMENT_PATH, payload).boxed()
    }

    fn ping(&self) -> BoxFuture<'_, bool> {
        self.get_health().boxed()
    }
}
