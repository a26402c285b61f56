//! Remote repo API abstraction.
//!
//! `RepoApi` is the seam between record operations and the PDS. The XRPC
//! client talks to a real server; the mock keeps records in memory for tests.

use async_trait::async_trait;

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod types;
pub mod xrpc;

#[cfg(test)]
pub use mock::MockRepo;
pub use types::{
    BlobRef, CreateRecordInput, DeleteRecordInput, ListRecordsParams, ListRecordsResponse,
    PutRecordInput, RecordEntry, RecordRef, Session, XrpcConfig,
};
pub use xrpc::XrpcClient;

/// Request/response calls against a repository host.
///
/// Each method is exactly one remote call. Implementations must be shareable
/// across concurrently running batch tasks.
#[async_trait]
pub trait RepoApi: Send + Sync {
    /// DID of the authenticated account, if logged in
    fn session_did(&self) -> Option<&str>;

    /// `com.atproto.repo.listRecords`
    async fn list_records(&self, params: ListRecordsParams) -> Result<ListRecordsResponse>;

    /// `com.atproto.repo.getRecord`
    async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordEntry>;

    /// `com.atproto.repo.createRecord`
    async fn create_record(&self, input: CreateRecordInput) -> Result<RecordRef>;

    /// `com.atproto.repo.putRecord` (full replace)
    async fn put_record(&self, input: PutRecordInput) -> Result<RecordRef>;

    /// `com.atproto.repo.deleteRecord`
    async fn delete_record(&self, input: DeleteRecordInput) -> Result<()>;

    /// `com.atproto.repo.uploadBlob`
    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef>;
}
