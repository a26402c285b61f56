//! Configuration for pdsx
//!
//! CLI arguments and environment variable handling using clap. Every global
//! flag can also come from the environment (or a `.env` file loaded at
//! startup); explicit flags win.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::batch::{BatchOptions, DEFAULT_CONCURRENCY};
use crate::client::XrpcConfig;
use crate::display::OutputFormat;
use crate::error::{PdsxError, Result};
use crate::operations::DEFAULT_LIST_LIMIT;

/// Default PDS when none is configured or discovered
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Default PLC directory for `did:plc` documents
pub const DEFAULT_PLC_URL: &str = "https://plc.directory";

/// pdsx - record operations against AT Protocol repositories
#[derive(Parser, Debug, Clone)]
#[command(name = "pdsx")]
#[command(about = "Read and write records in AT Protocol repositories")]
#[command(version, disable_version_flag = true)]
pub struct Args {
    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Account handle or DID to log in with
    #[arg(long, env = "ATPROTO_HANDLE", global = true)]
    pub handle: Option<String>,

    /// App password for the account
    #[arg(long, env = "ATPROTO_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// PDS URL to use for login and anonymous reads (skips discovery)
    #[arg(long, global = true)]
    pub pds: Option<String>,

    /// Repo (handle or DID) to read from without logging in
    #[arg(short = 'r', long, global = true)]
    pub repo: Option<String>,

    /// Fallback PDS URL when discovery fails
    #[arg(long, env = "ATPROTO_PDS_URL", default_value = DEFAULT_PDS_URL, hide = true)]
    pub pds_url: String,

    /// PLC directory URL for did:plc resolution
    #[arg(long, env = "PLC_DIRECTORY_URL", default_value = DEFAULT_PLC_URL, global = true)]
    pub plc_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "PDSX_TIMEOUT_SECS", default_value = "30", global = true)]
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List records in a collection
    #[command(visible_alias = "ls")]
    List {
        /// Collection NSID (e.g. app.bsky.feed.post)
        collection: String,

        /// Maximum records to return
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,

        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Output format (default: compact)
        #[arg(short = 'o', long, value_enum)]
        output: Option<OutputFormat>,
    },

    /// Get a single record
    #[command(visible_alias = "cat")]
    Get {
        /// Record URI (at://repo/collection/rkey or collection/rkey)
        uri: String,

        /// Output format (default: table)
        #[arg(short = 'o', long, value_enum)]
        output: Option<OutputFormat>,
    },

    /// Create records from key=value arguments or JSON Lines on stdin
    #[command(visible_aliases = ["touch", "add"])]
    Create {
        /// Collection NSID
        collection: String,

        /// Record fields as key=value
        fields: Vec<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Update records from `uri key=value...` or JSON Lines on stdin
    #[command(visible_alias = "edit")]
    Update {
        /// Record URI
        uri: Option<String>,

        /// Fields to merge as key=value
        fields: Vec<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Delete records by URI, from arguments or stdin
    #[command(visible_alias = "rm")]
    Delete {
        /// Record URIs
        uris: Vec<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Upload a file as a blob
    UploadBlob {
        /// Path to the file
        file_path: PathBuf,
    },
}

/// Flags shared by batch-capable commands
#[derive(ClapArgs, Debug, Clone)]
pub struct BatchArgs {
    /// Maximum concurrent operations
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Stop after the first failed operation
    #[arg(long)]
    pub fail_fast: bool,
}

impl BatchArgs {
    /// Batch options, with progress shown when requested
    pub fn options(&self, show_progress: bool) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            fail_fast: self.fail_fast,
            show_progress,
        }
    }
}

impl Args {
    /// Whether the command needs a logged-in session.
    ///
    /// Reads against an explicit `--repo` run anonymously; everything else
    /// needs credentials.
    pub fn needs_auth(&self) -> bool {
        let is_read = matches!(
            self.command,
            Some(Command::List { .. }) | Some(Command::Get { .. })
        );
        !is_read || self.repo.is_none()
    }
}

/// Resolved runtime settings, built once at startup
pub struct Settings {
    /// PDS explicitly chosen with `--pds`
    pub pds_override: Option<String>,
    /// Fallback PDS URL
    pub pds_url: String,
    pub plc_url: String,
    pub handle: Option<String>,
    password: Option<Zeroizing<String>>,
    pub timeout_secs: u64,
}

impl Settings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            pds_override: args.pds.clone(),
            pds_url: args.pds_url.clone(),
            plc_url: args.plc_url.clone(),
            handle: args.handle.clone().filter(|h| !h.is_empty()),
            password: args
                .password
                .clone()
                .filter(|p| !p.is_empty())
                .map(Zeroizing::new),
            timeout_secs: args.timeout_secs,
        }
    }

    /// Handle and password, or `NotAuthenticated` if either is missing
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.handle, &self.password) {
            (Some(handle), Some(password)) => Ok((handle.as_str(), password.as_str())),
            _ => Err(PdsxError::NotAuthenticated),
        }
    }

    /// Client configuration for `base_url`
    pub fn xrpc_config(&self, base_url: &str) -> XrpcConfig {
        XrpcConfig {
            base_url: base_url.to_string(),
            timeout_secs: self.timeout_secs,
        }
    }
}
