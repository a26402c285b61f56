//! In-memory repo for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::types::*;
use super::RepoApi;
use crate::error::{PdsxError, Result};
use crate::value::{Fields, RecordValue};

type RecordKey = (String, String, String);

/// In-memory repo host.
///
/// Records live in a map keyed by (repo, collection, rkey). Individual rkeys
/// can be made to fail, and an artificial latency makes concurrency
/// observable: the peak number of simultaneously running calls is tracked.
pub struct MockRepo {
    did: Option<String>,
    records: Mutex<BTreeMap<RecordKey, Fields>>,
    failing: Mutex<HashSet<String>>,
    latency: Duration,
    next_rkey: AtomicU64,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockRepo {
    /// Create a mock logged in as `did`
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: Some(did.into()),
            ..Self::anonymous()
        }
    }

    /// Create a mock with no session
    pub fn anonymous() -> Self {
        Self {
            did: None,
            records: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            latency: Duration::ZERO,
            next_rkey: AtomicU64::new(1),
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Seed a record
    pub fn with_record(self, repo: &str, collection: &str, rkey: &str, fields: Fields) -> Self {
        self.insert(repo, collection, rkey, fields);
        self
    }

    /// Make every call touching `rkey` fail
    pub fn with_failing_rkey(self, rkey: &str) -> Self {
        self.lock_failing().insert(rkey.to_string());
        self
    }

    /// Make record creation fail when the body has `text == value`
    pub fn with_failing_text(self, value: &str) -> Self {
        self.lock_failing().insert(format!("text:{value}"));
        self
    }

    /// Store a record directly
    pub fn insert(&self, repo: &str, collection: &str, rkey: &str, fields: Fields) {
        self.lock_records().insert(
            (repo.to_string(), collection.to_string(), rkey.to_string()),
            fields,
        );
    }

    /// Read a stored record directly
    pub fn stored(&self, repo: &str, collection: &str, rkey: &str) -> Option<Fields> {
        self.lock_records()
            .get(&(repo.to_string(), collection.to_string(), rkey.to_string()))
            .cloned()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    /// Whether the repo holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of remote calls made
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, BTreeMap<RecordKey, Fields>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_failing(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.failing.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_failing(&self, key: &str) -> bool {
        self.lock_failing().contains(key)
    }

    async fn enter(&self) -> CallGuard<'_> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = CallGuard { repo: self };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }

    fn simulated_failure(what: &str) -> PdsxError {
        PdsxError::Xrpc {
            status: 500,
            error: "InternalServerError".to_string(),
            message: format!("simulated failure: {what}"),
        }
    }

    fn uri(repo: &str, collection: &str, rkey: &str) -> String {
        format!("at://{repo}/{collection}/{rkey}")
    }
}

struct CallGuard<'a> {
    repo: &'a MockRepo,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.repo.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RepoApi for MockRepo {
    fn session_did(&self) -> Option<&str> {
        self.did.as_deref()
    }

    async fn list_records(&self, params: ListRecordsParams) -> Result<ListRecordsResponse> {
        let _call = self.enter().await;

        let records = self.lock_records();
        let matching: Vec<RecordEntry> = records
            .iter()
            .filter(|((repo, collection, _), _)| {
                *repo == params.repo && *collection == params.collection
            })
            .filter(|((_, _, rkey), _)| match &params.cursor {
                Some(cursor) => rkey.as_str() > cursor.as_str(),
                None => true,
            })
            .take(params.limit as usize + 1)
            .map(|((repo, collection, rkey), fields)| RecordEntry {
                uri: Self::uri(repo, collection, rkey),
                cid: Some(format!("cid-{rkey}")),
                value: RecordValue::Object(fields.clone()),
            })
            .collect();

        let limit = params.limit as usize;
        let has_more = matching.len() > limit;
        let page: Vec<RecordEntry> = matching.into_iter().take(limit).collect();
        let cursor = if has_more {
            page.last()
                .map(|entry| crate::uri::rkey_of(&entry.uri).to_string())
        } else {
            None
        };

        Ok(ListRecordsResponse {
            records: page,
            cursor,
        })
    }

    async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordEntry> {
        let _call = self.enter().await;
        if self.is_failing(rkey) {
            return Err(Self::simulated_failure(rkey));
        }

        let fields = self.stored(repo, collection, rkey).ok_or_else(|| PdsxError::Xrpc {
            status: 400,
            error: "RecordNotFound".to_string(),
            message: format!("Could not locate record: {}", Self::uri(repo, collection, rkey)),
        })?;

        Ok(RecordEntry {
            uri: Self::uri(repo, collection, rkey),
            cid: Some(format!("cid-{rkey}")),
            value: RecordValue::Object(fields),
        })
    }

    async fn create_record(&self, input: CreateRecordInput) -> Result<RecordRef> {
        let _call = self.enter().await;
        if self.did.is_none() {
            return Err(PdsxError::NotAuthenticated);
        }
        if let Some(text) = input.record.get("text").and_then(RecordValue::as_str) {
            if self.is_failing(&format!("text:{text}")) {
                return Err(Self::simulated_failure(text));
            }
        }

        let rkey = format!("{:013}", self.next_rkey.fetch_add(1, Ordering::SeqCst));
        self.insert(&input.repo, &input.collection, &rkey, input.record);
        Ok(RecordRef {
            uri: Self::uri(&input.repo, &input.collection, &rkey),
            cid: format!("cid-{rkey}"),
        })
    }

    async fn put_record(&self, input: PutRecordInput) -> Result<RecordRef> {
        let _call = self.enter().await;
        if self.did.is_none() {
            return Err(PdsxError::NotAuthenticated);
        }
        if self.is_failing(&input.rkey) {
            return Err(Self::simulated_failure(&input.rkey));
        }

        self.insert(&input.repo, &input.collection, &input.rkey, input.record);
        Ok(RecordRef {
            uri: Self::uri(&input.repo, &input.collection, &input.rkey),
            cid: format!("cid-{}", input.rkey),
        })
    }

    async fn delete_record(&self, input: DeleteRecordInput) -> Result<()> {
        let _call = self.enter().await;
        if self.did.is_none() {
            return Err(PdsxError::NotAuthenticated);
        }
        if self.is_failing(&input.rkey) {
            return Err(Self::simulated_failure(&input.rkey));
        }

        self.lock_records()
            .remove(&(input.repo, input.collection, input.rkey));
        Ok(())
    }

    async fn upload_blob(&self, data: Vec<u8>, mime_type: &str) -> Result<BlobRef> {
        let _call = self.enter().await;
        if self.did.is_none() {
            return Err(PdsxError::NotAuthenticated);
        }

        Ok(BlobRef {
            blob_type: "blob".to_string(),
            reference: CidLink {
                link: format!("bafkrei{}", data.len()),
            },
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(text: &str) -> Fields {
        let mut f = Fields::new();
        f.insert("text".into(), RecordValue::from(text));
        f
    }

    #[tokio::test]
    async fn test_mock_round_trip() {
        let repo = MockRepo::new("did:plc:test");
        let created = repo
            .create_record(CreateRecordInput {
                repo: "did:plc:test".into(),
                collection: "app.bsky.feed.post".into(),
                record: fields("hello"),
            })
            .await
            .unwrap();

        let rkey = crate::uri::rkey_of(&created.uri).to_string();
        let got = repo
            .get_record("did:plc:test", "app.bsky.feed.post", &rkey)
            .await
            .unwrap();
        assert_eq!(got.uri, created.uri);
        assert_eq!(repo.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_pagination() {
        let repo = MockRepo::new("did:plc:test")
            .with_record("did:plc:test", "c", "a", fields("1"))
            .with_record("did:plc:test", "c", "b", fields("2"))
            .with_record("did:plc:test", "c", "c", fields("3"));

        let first = repo
            .list_records(ListRecordsParams {
                repo: "did:plc:test".into(),
                collection: "c".into(),
                limit: 2,
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.cursor.as_deref(), Some("b"));

        let second = repo
            .list_records(ListRecordsParams {
                repo: "did:plc:test".into(),
                collection: "c".into(),
                limit: 2,
                cursor: first.cursor,
            })
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(second.cursor.is_none());
    }

    #[tokio::test]
    async fn test_mock_anonymous_cannot_write() {
        let repo = MockRepo::anonymous();
        let result = repo
            .delete_record(DeleteRecordInput {
                repo: "did:plc:x".into(),
                collection: "c".into(),
                rkey: "r".into(),
            })
            .await;
        assert!(matches!(result, Err(PdsxError::NotAuthenticated)));
    }
}
