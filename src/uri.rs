//! AT-URI parsing
//!
//! Two textual forms are accepted:
//!
//! - full: `at://repo/collection/rkey` (the `at://` prefix is optional)
//! - shorthand: `collection/rkey`, which takes its repo from the
//!   authenticated session or an explicit `--repo`
//!
//! Parsing is structural only. Case and percent-encoding are left untouched.

use std::fmt;

use crate::error::{PdsxError, Result};

const AT_PREFIX: &str = "at://";

/// Parsed components of an AT-URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse a full or shorthand AT-URI.
    ///
    /// `authenticated_repo` is only consulted for the shorthand form; without
    /// it a shorthand URI fails with [`PdsxError::AuthRequired`].
    pub fn parse(uri: &str, authenticated_repo: Option<&str>) -> Result<Self> {
        let path = uri.strip_prefix(AT_PREFIX).unwrap_or(uri);
        let parts: Vec<&str> = path.split('/').collect();

        match parts.as_slice() {
            [collection, rkey] => {
                let repo = authenticated_repo.ok_or(PdsxError::AuthRequired)?;
                Ok(Self {
                    repo: repo.to_string(),
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            [repo, collection, rkey] => Ok(Self {
                repo: repo.to_string(),
                collection: collection.to_string(),
                rkey: rkey.to_string(),
            }),
            _ => Err(PdsxError::InvalidUri(uri.to_string())),
        }
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{AT_PREFIX}{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}

/// Last path segment of a URI or label, used as a compact display key
pub fn rkey_of(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_uses_authenticated_repo() {
        let parts = AtUri::parse("collection/rkey", Some("did:plc:X")).unwrap();
        assert_eq!(
            parts,
            AtUri {
                repo: "did:plc:X".into(),
                collection: "collection".into(),
                rkey: "rkey".into(),
            }
        );
    }

    #[test]
    fn test_shorthand_without_repo_requires_auth() {
        let err = AtUri::parse("collection/rkey", None).unwrap_err();
        assert!(matches!(err, PdsxError::AuthRequired));
    }

    #[test]
    fn test_full_form_with_and_without_prefix() {
        let with_prefix = AtUri::parse("at://did:plc:X/collection/rkey", None).unwrap();
        let without_prefix = AtUri::parse("did:plc:X/collection/rkey", None).unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert_eq!(with_prefix.repo, "did:plc:X");
        assert_eq!(with_prefix.collection, "collection");
        assert_eq!(with_prefix.rkey, "rkey");
    }

    #[test]
    fn test_full_form_ignores_authenticated_repo() {
        let parts = AtUri::parse("at://did:plc:other/app.bsky.feed.post/abc", Some("did:plc:me"))
            .unwrap();
        assert_eq!(parts.repo, "did:plc:other");
    }

    #[test]
    fn test_wrong_segment_counts_are_invalid() {
        for uri in ["a/b/c/d", "a", "invalid/uri/format/too/many/parts"] {
            match AtUri::parse(uri, Some("did:plc:X")) {
                Err(PdsxError::InvalidUri(s)) => assert_eq!(s, uri),
                other => panic!("expected InvalidUri for {uri}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_no_normalization() {
        let parts = AtUri::parse("at://Did:PLC:X/App.Post/a%20b", None).unwrap();
        assert_eq!(parts.repo, "Did:PLC:X");
        assert_eq!(parts.collection, "App.Post");
        assert_eq!(parts.rkey, "a%20b");
    }

    #[test]
    fn test_display_round_trips_full_form() {
        let parts = AtUri::parse("app.bsky.feed.post/3k", Some("did:plc:X")).unwrap();
        assert_eq!(parts.to_string(), "at://did:plc:X/app.bsky.feed.post/3k");
    }

    #[test]
    fn test_rkey_of() {
        assert_eq!(rkey_of("at://did:plc:X/app.bsky.feed.post/3k"), "3k");
        assert_eq!(rkey_of("record #2"), "record #2");
    }
}
