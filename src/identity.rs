//! Identity resolution
//!
//! Maps handles to DIDs and DIDs to the PDS that hosts their repo.
//!
//! - handle → DID: `https://{handle}/.well-known/atproto-did`, falling back to
//!   `com.atproto.identity.resolveHandle` on the configured PDS
//! - `did:plc:` → DID document from the PLC directory
//! - `did:web:` → DID document from the domain's `.well-known/did.json`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::types::ResolveHandleResponse;
use crate::error::{PdsxError, Result};

/// Literal prefix shared by every DID
pub const DID_PREFIX: &str = "did:";

const PDS_SERVICE_ID: &str = "#atproto_pds";
const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// Handle and DID lookups used by PDS discovery
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a handle to its DID, `None` if it cannot be resolved
    async fn resolve_handle(&self, handle: &str) -> Option<String>;

    /// Resolve a DID to its PDS base URL, `None` if the document has no PDS
    async fn resolve_pds(&self, did: &str) -> Option<String>;
}

/// Resolve a repo identifier to a DID.
///
/// Identifiers that already start with `did:` are returned unchanged.
pub async fn resolve_repo_did<R: IdentityResolver + ?Sized>(
    resolver: &R,
    repo: &str,
) -> Result<String> {
    if repo.starts_with(DID_PREFIX) {
        return Ok(repo.to_string());
    }

    resolver
        .resolve_handle(repo)
        .await
        .ok_or_else(|| PdsxError::HandleUnresolved(repo.to_string()))
}

/// Find the PDS hosting a handle or DID
pub async fn discover_pds<R: IdentityResolver + ?Sized>(resolver: &R, repo: &str) -> Result<String> {
    let did = resolve_repo_did(resolver, repo).await?;
    let pds = resolver
        .resolve_pds(&did)
        .await
        .ok_or_else(|| PdsxError::PdsNotFound(repo.to_string()))?;

    info!(repo = %repo, did = %did, pds = %pds, "Discovered PDS");
    Ok(pds)
}

/// Identity resolver backed by HTTP lookups
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    plc_url: String,
    pds_url: String,
    well_known_base: Option<String>,
}

impl HttpIdentityResolver {
    /// Create a resolver using `plc_url` for `did:plc` documents and
    /// `pds_url` for the `resolveHandle` fallback
    pub fn new(plc_url: &str, pds_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("pdsx/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            plc_url: plc_url.trim_end_matches('/').to_string(),
            pds_url: pds_url.trim_end_matches('/').to_string(),
            well_known_base: None,
        })
    }

    /// Serve `.well-known/atproto-did` from a fixed base URL instead of the
    /// handle's own domain
    pub fn with_well_known_base(mut self, base: &str) -> Self {
        self.well_known_base = Some(base.trim_end_matches('/').to_string());
        self
    }

    fn well_known_url(&self, handle: &str) -> String {
        match &self.well_known_base {
            Some(base) => format!("{base}/.well-known/atproto-did"),
            None => format!("https://{handle}/.well-known/atproto-did"),
        }
    }

    async fn handle_from_well_known(&self, handle: &str) -> Option<String> {
        let url = self.well_known_url(handle);
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(handle = %handle, status = %response.status(), "well-known lookup failed");
                return None;
            }
            Err(e) => {
                debug!(handle = %handle, error = %e, "well-known lookup failed");
                return None;
            }
        };

        let body = response.text().await.ok()?;
        let did = body.trim();
        did.starts_with(DID_PREFIX).then(|| did.to_string())
    }

    async fn handle_from_xrpc(&self, handle: &str) -> Option<String> {
        let url = format!("{}/xrpc/com.atproto.identity.resolveHandle", self.pds_url);
        let response = self
            .client
            .get(&url)
            .query(&[("handle", handle)])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!(handle = %handle, status = %response.status(), "resolveHandle failed");
            return None;
        }

        response
            .json::<ResolveHandleResponse>()
            .await
            .ok()
            .map(|r| r.did)
    }

    async fn fetch_document(&self, did: &str) -> Result<DidDocument> {
        let url = if did.starts_with("did:plc:") {
            format!("{}/{}", self.plc_url, did)
        } else if did.starts_with("did:web:") {
            did_web_to_url(did)?
        } else {
            return Err(PdsxError::PdsNotFound(did.to_string()));
        };
        debug!(did = %did, url = %url, "Fetching DID document");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/did+ld+json, application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PdsxError::InvalidResponse(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let document: DidDocument = response
            .json()
            .await
            .map_err(|e| PdsxError::InvalidResponse(e.to_string()))?;

        if document.id != did {
            warn!(expected = %did, actual = %document.id, "DID document ID mismatch");
        }

        Ok(document)
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve_handle(&self, handle: &str) -> Option<String> {
        if let Some(did) = self.handle_from_well_known(handle).await {
            return Some(did);
        }
        self.handle_from_xrpc(handle).await
    }

    async fn resolve_pds(&self, did: &str) -> Option<String> {
        match self.fetch_document(did).await {
            Ok(document) => document.pds_endpoint().map(str::to_string),
            Err(e) => {
                debug!(did = %did, error = %e, "DID document lookup failed");
                None
            }
        }
    }
}

/// Convert a did:web DID to its document URL
///
/// did:web:example.com → https://example.com/.well-known/did.json
/// did:web:example.com:path:to → https://example.com/path/to/did.json
fn did_web_to_url(did: &str) -> Result<String> {
    let without_prefix = did
        .strip_prefix("did:web:")
        .ok_or_else(|| PdsxError::InvalidArgument(format!("not a did:web DID: {did}")))?;

    let mut parts = without_prefix.split(':');
    let domain = match parts.next() {
        Some(domain) if !domain.is_empty() => domain.replace("%3A", ":"),
        _ => {
            return Err(PdsxError::InvalidArgument(format!(
                "empty domain in did:web: {did}"
            )))
        }
    };

    let path: Vec<&str> = parts.collect();
    let path = if path.is_empty() {
        "/.well-known/did.json".to_string()
    } else {
        format!("/{}/did.json", path.join("/"))
    };

    Ok(format!("https://{domain}{path}"))
}

/// DID document, reduced to the parts PDS discovery needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    pub id: String,

    #[serde(default)]
    pub service: Vec<Service>,
}

impl DidDocument {
    /// Endpoint of the `#atproto_pds` service
    pub fn pds_endpoint(&self) -> Option<&str> {
        self.service
            .iter()
            .find(|s| s.id.ends_with(PDS_SERVICE_ID) || s.service_type == PDS_SERVICE_TYPE)
            .map(|s| s.service_endpoint.as_str())
    }
}

/// Service entry in a DID document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}
