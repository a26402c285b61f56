//! Single-record operations
//!
//! Each function resolves its target, makes exactly one remote call (two for
//! `update_record`, which reads before it writes) and returns the response.

use chrono::{SecondsFormat, Utc};
use std::path::Path;
use tracing::{debug, info};

use crate::client::{
    BlobRef, CreateRecordInput, DeleteRecordInput, ListRecordsParams, ListRecordsResponse,
    PutRecordInput, RecordEntry, RecordRef, RepoApi,
};
use crate::error::{PdsxError, Result};
use crate::uri::AtUri;
use crate::value::{Fields, RecordValue};

/// Default page size for `list_records`
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// List one page of records in `collection`.
///
/// `repo` defaults to the authenticated account.
pub async fn list_records(
    api: &dyn RepoApi,
    collection: &str,
    repo: Option<&str>,
    limit: u32,
    cursor: Option<String>,
) -> Result<ListRecordsResponse> {
    let repo = repo.or(api.session_did()).ok_or_else(|| {
        PdsxError::InvalidArgument("no repo specified and not authenticated".to_string())
    })?;

    debug!(repo = %repo, collection = %collection, limit, "Listing records");
    api.list_records(ListRecordsParams {
        repo: repo.to_string(),
        collection: collection.to_string(),
        limit,
        cursor,
    })
    .await
}

/// Fetch a single record.
///
/// Shorthand URIs take their repo from the session, or from `repo` when
/// reading anonymously.
pub async fn get_record(api: &dyn RepoApi, uri: &str, repo: Option<&str>) -> Result<RecordEntry> {
    let target = AtUri::parse(uri, api.session_did().or(repo))?;
    api.get_record(&target.repo, &target.collection, &target.rkey)
        .await
}

/// Create a record in the authenticated repo
pub async fn create_record(
    api: &dyn RepoApi,
    collection: &str,
    fields: Fields,
) -> Result<RecordRef> {
    let repo = api.session_did().ok_or(PdsxError::NotAuthenticated)?;
    let record = with_defaults(collection, fields);

    let created = api
        .create_record(CreateRecordInput {
            repo: repo.to_string(),
            collection: collection.to_string(),
            record,
        })
        .await?;

    info!(uri = %created.uri, "Created record");
    Ok(created)
}

/// Merge `updates` into an existing record and write it back.
///
/// This is a read followed by a full replace; a concurrent write between the
/// two calls is overwritten.
pub async fn update_record(api: &dyn RepoApi, uri: &str, updates: Fields) -> Result<RecordRef> {
    let session_did = api.session_did().ok_or(PdsxError::NotAuthenticated)?;
    let target = AtUri::parse(uri, Some(session_did))?;

    let current = api
        .get_record(&target.repo, &target.collection, &target.rkey)
        .await?;
    let record = merge_fields(current.fields(), updates);

    let updated = api
        .put_record(PutRecordInput {
            repo: target.repo,
            collection: target.collection,
            rkey: target.rkey,
            record,
        })
        .await?;

    info!(uri = %updated.uri, "Updated record");
    Ok(updated)
}

/// Delete a record
pub async fn delete_record(api: &dyn RepoApi, uri: &str) -> Result<()> {
    let session_did = api.session_did().ok_or(PdsxError::NotAuthenticated)?;
    let target = AtUri::parse(uri, Some(session_did))?;

    api.delete_record(DeleteRecordInput {
        repo: target.repo,
        collection: target.collection,
        rkey: target.rkey,
    })
    .await?;

    info!(uri = %uri, "Deleted record");
    Ok(())
}

/// Upload a local file as a blob
pub async fn upload_blob(api: &dyn RepoApi, path: &Path) -> Result<BlobRef> {
    if api.session_did().is_none() {
        return Err(PdsxError::NotAuthenticated);
    }

    let data = tokio::fs::read(path).await?;
    let mime_type = guess_mime_type(path);
    debug!(path = %path.display(), size = data.len(), mime_type, "Uploading blob");

    api.upload_blob(data, mime_type).await
}

/// Shallow merge: keys in `updates` replace keys in `current`
pub fn merge_fields(mut current: Fields, updates: Fields) -> Fields {
    current.extend(updates);
    current
}

/// Fill in `$type` and `createdAt` when absent
pub fn with_defaults(collection: &str, mut fields: Fields) -> Fields {
    fields
        .entry("$type".to_string())
        .or_insert_with(|| RecordValue::from(collection));
    fields.entry("createdAt".to_string()).or_insert_with(|| {
        RecordValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    });
    fields
}

/// MIME type from the file extension
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}
