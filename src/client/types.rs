//! Wire types for the `com.atproto.repo.*` and `com.atproto.server.*` XRPC API

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::value::{Fields, RecordValue};

/// Client configuration
#[derive(Debug, Clone)]
pub struct XrpcConfig {
    /// Base URL of the PDS (e.g. `https://bsky.social`)
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for XrpcConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bsky.social".to_string(),
            timeout_secs: 30,
        }
    }
}

/// One record as returned by `listRecords` and `getRecord`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Full AT-URI of the record
    pub uri: String,
    /// Content hash of the record (optional on `getRecord`)
    #[serde(default)]
    pub cid: Option<String>,
    /// Record body
    pub value: RecordValue,
}

impl RecordEntry {
    /// Record body as a field map; non-object bodies yield an empty map
    pub fn fields(&self) -> Fields {
        match &self.value {
            RecordValue::Object(map) => map.clone(),
            _ => Fields::new(),
        }
    }
}

/// Page of records from `listRecords`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    /// Records in this page
    #[serde(default)]
    pub records: Vec<RecordEntry>,
    /// Opaque cursor for the next page, absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Reference to a written record (`createRecord` / `putRecord`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

/// Content link inside a blob reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// Blob reference usable inside record bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRef {
    #[serde(rename = "$type", default = "blob_type")]
    pub blob_type: String,
    #[serde(rename = "ref")]
    pub reference: CidLink,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: u64,
}

fn blob_type() -> String {
    "blob".to_string()
}

/// Response from `uploadBlob`
#[derive(Debug, Clone, Deserialize)]
pub struct UploadBlobResponse {
    pub blob: BlobRef,
}

/// Request parameters for `listRecords`
#[derive(Debug, Clone, Serialize)]
pub struct ListRecordsParams {
    pub repo: String,
    pub collection: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Request body for `createRecord`
#[derive(Debug, Clone, Serialize)]
pub struct CreateRecordInput {
    pub repo: String,
    pub collection: String,
    pub record: Fields,
}

/// Request body for `putRecord`
#[derive(Debug, Clone, Serialize)]
pub struct PutRecordInput {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
    pub record: Fields,
}

/// Request body for `deleteRecord`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteRecordInput {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

/// Request body for `createSession`
#[derive(Serialize)]
pub(crate) struct CreateSessionInput<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Authenticated session from `createSession`
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    #[zeroize(skip)]
    pub did: String,
    #[zeroize(skip)]
    pub handle: String,
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt", default)]
    pub refresh_jwt: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Error body returned by XRPC endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response from `com.atproto.identity.resolveHandle`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResolveHandleResponse {
    pub did: String,
}
