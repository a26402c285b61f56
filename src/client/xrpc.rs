//! HTTP client for the AT Protocol XRPC repo API

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::types::*;
use super::RepoApi;
use crate::error::{PdsxError, Result};

/// HTTP client for a PDS's `/xrpc` endpoints
///
/// # Example
///
/// ```rust,no_run
/// use pdsx::client::{ListRecordsParams, RepoApi, XrpcClient, XrpcConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = XrpcClient::new(XrpcConfig {
///     base_url: "https://bsky.social".into(),
///     ..Default::default()
/// })?;
/// client.login("alice.bsky.social", "app-password").await?;
///
/// let page = client
///     .list_records(ListRecordsParams {
///         repo: client.session_did().unwrap_or_default().to_string(),
///         collection: "app.bsky.feed.post".into(),
///         limit: 10,
///         cursor: None,
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct XrpcClient {
    config: XrpcConfig,
    client: Client,
    session: Option<Session>,
}

impl XrpcClient {
    /// Create an unauthenticated client
    pub fn new(mut config: XrpcConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pdsx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            client,
            session: None,
        })
    }

    /// Authenticate with `com.atproto.server.createSession`.
    ///
    /// The access token is attached to every subsequent request.
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<&Session> {
        if identifier.is_empty() || password.is_empty() {
            return Err(PdsxError::NotAuthenticated);
        }

        let url = self.endpoint("com.atproto.server.createSession");
        let response = self
            .client
            .post(&url)
            .json(&CreateSessionInput {
                identifier,
                password,
            })
            .send()
            .await?;
        let session: Session = Self::handle_response(response).await?;

        info!(did = %session.did, handle = %session.handle, "Authenticated");
        let session = self.session.insert(session);
        Ok(&*session)
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.config.base_url, nsid)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(session) => request.bearer_auth(&session.access_jwt),
            None => request,
        }
    }

    async fn query<T, P>(&self, nsid: &str, params: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(nsid);
        debug!(url = %url, "XRPC query");
        let response = self
            .authorized(self.client.get(&url))
            .query(params)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn procedure<B>(&self, nsid: &str, body: &B) -> Result<reqwest::Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let url = self.endpoint(nsid);
        debug!(url = %url, "XRPC procedure");
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(PdsxError::NotAuthenticated)
    }

    // ==================== Helper Methods ====================

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body: XrpcErrorBody = serde_json::from_str(&text).unwrap_or_default();

        Err(PdsxError::Xrpc {
            status,
            error: body.error.unwrap_or_else(|| "HTTPError".to_string()),
            message: body.message.unwrap_or(text),
        })
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| PdsxError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RepoApi for XrpcClient {
    fn session_did(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.did.as_str())
    }

    async fn list_records(&self, params: ListRecordsParams) -> Result<ListRecordsResponse> {
        self.query("com.atproto.repo.listRecords", &params).await
    }

    async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordEntry> {
        self.query(
            "com.atproto.repo.getRecord",
            &[("repo", repo), ("collection", collection), ("rkey", rkey)],
        )
        .await
    }

    async fn create_record(&self, input: CreateRecordInput) -> Result<RecordRef> {
        self.require_session()?;
        let response = self.procedure("com.atproto.repo.createRecord", &input).await?;
        Self::handle_response(response).await
    }

    async fn put_record(&self, input: PutRecordInput) -> Result<RecordRef> {
        self.require_session()?;
        let response = self.procedure("com.atproto.repo.putRecord", &input).await?;
        Self::handle_response(response).await
    }

    async fn delete_record(&self, input: DeleteRecordInput) -> Result<()> {
        self.require_session()?;
        self.procedure("com.atproto.repo.deleteRecord", &input).await?;
        Ok(())
    }

    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        self.require_session()?;
        let url = self.endpoint("com.atproto.repo.uploadBlob");
        debug!(url = %url, size = data.len(), mime_type = %mime_type, "Uploading blob");

        let response = self
            .authorized(self.client.post(&url))
            .header(header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?;
        let uploaded: UploadBlobResponse = Self::handle_response(response).await?;
        Ok(uploaded.blob)
    }
}
