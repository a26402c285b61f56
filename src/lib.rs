//! pdsx - record operations for AT Protocol repositories
//!
//! Reads and writes records on a PDS (personal data server), one at a time
//! or in concurrent batches.
//!
//! ## Modules
//!
//! - **uri**: AT-URI parsing, full and `collection/rkey` shorthand
//! - **identity**: handle → DID → PDS discovery
//! - **parsing**: `key=value` arguments and JSON Lines input
//! - **operations**: list, get, create, update, delete, upload-blob
//! - **batch**: bounded-concurrency batches with fail-fast
//! - **display**: JSON, YAML, compact and table output

pub mod batch;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod identity;
pub mod operations;
pub mod parsing;
pub mod uri;
pub mod value;

pub use batch::{BatchOptions, BatchResult};
pub use client::{RepoApi, XrpcClient};
pub use config::{Args, Settings};
pub use error::{PdsxError, Result};
pub use uri::AtUri;
pub use value::{Fields, RecordValue};
