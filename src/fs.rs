use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub mod cache;
pub mod http;
pub mod order;

/// Shown when a failed fetch carries no usable description
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to fetch files";

/// Represents a file/directory inside a remote listing
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ListingEntry {
    #[serde(default)]
    pub name: String,
    /// True if the entry is a directory, false if it is a file
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
    /// Raw RFC 3339 timestamp as sent by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Fields this client does not know about, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingEntry {
    /// Parse `mod_time`. Returns `None` if it is absent or not valid RFC 3339
    pub fn modified(&self) -> Option<OffsetDateTime> {
        self.mod_time
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
    }
}

/// The entries directly under one path, in server order. `None` means the server
/// reported nothing (a `null` or empty body), which is a valid empty listing.
pub type Listing = Option<Vec<ListingEntry>>;

/// Split a listing into its folders and its files, keeping source order on both sides
pub fn partition(listing: Option<&[ListingEntry]>) -> (Vec<ListingEntry>, Vec<ListingEntry>) {
    listing
        .unwrap_or_default()
        .iter()
        .cloned()
        .partition(|entry| entry.is_dir)
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("A listing path must not be empty")]
    EmptyPath,

    #[error("Authentication required{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unauthenticated { message: Option<String> },

    #[error("The server responded with status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    #[error("The server could not be reached")]
    Transport(#[source] anyhow::Error),

    #[error("The server sent a listing that could not be parsed")]
    Malformed(#[source] serde_json::Error),
}

impl FetchError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, FetchError::Unauthenticated { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Unauthenticated { .. } => Some(401),
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn server_message(&self) -> Option<&str> {
        match self {
            FetchError::Unauthenticated { message } | FetchError::Status { message, .. } => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
            _ => None,
        }
    }
}

/// A failed fetch as recorded in the listing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub status: Option<u16>,
}

impl From<&FetchError> for ErrorInfo {
    fn from(error: &FetchError) -> Self {
        let message = match error {
            FetchError::Unauthenticated { .. } | FetchError::Status { .. } => error
                .server_message()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_owned()),
            other => {
                let description = other.to_string();
                if description.is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_owned()
                } else {
                    description
                }
            }
        };

        ErrorInfo {
            message,
            status: error.status(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the listing at `path`, authenticating with `token` when one is given
    async fn list(&self, path: &str, token: Option<&str>) -> Result<Listing, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> ListingEntry {
        ListingEntry {
            name: name.to_owned(),
            is_dir,
            size: 0,
            mod_time: None,
            path: None,
            thumbnail_url: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn partition_splits_by_kind_and_keeps_order() {
        let listing = vec![
            entry("b.txt", false),
            entry("docs", true),
            entry("a.txt", false),
            entry("photos", true),
        ];

        let (folders, files) = partition(Some(&listing));

        assert_eq!(
            folders.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            ["docs", "photos"]
        );
        assert_eq!(
            files.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            ["b.txt", "a.txt"]
        );
        assert!(folders.iter().all(|e| e.is_dir));
        assert!(files.iter().all(|e| !e.is_dir));
        assert_eq!(folders.len() + files.len(), listing.len());
        for item in &listing {
            assert!(folders.contains(item) || files.contains(item));
        }
    }

    #[test]
    fn partition_of_missing_listing_is_empty() {
        let (folders, files) = partition(None);
        assert!(folders.is_empty());
        assert!(files.is_empty());
    }

    #[test]
    fn entry_keeps_unknown_fields() {
        let raw = r#"{"name":"a.png","is_dir":false,"size":12,"mod_time":"2024-03-15T12:00:00Z","path":"/a.png","owner":"maria"}"#;
        let parsed: ListingEntry = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.path.as_deref(), Some("/a.png"));
        assert_eq!(parsed.extra.get("owner"), Some(&Value::from("maria")));
        assert_eq!(parsed.modified().map(|t| t.year()), Some(2024));

        let back: Value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["owner"], "maria");
        assert!(back.get("thumbnail_url").is_none());
    }

    #[test]
    fn entry_defaults_missing_fields() {
        let parsed: ListingEntry = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(!parsed.is_dir);
        assert_eq!(parsed.size, 0);
        assert!(parsed.modified().is_none());
    }

    #[test]
    fn listing_tolerates_entry_without_name() {
        let raw = r#"[{"is_dir":true,"size":0},{"name":"a","is_dir":false,"size":3}]"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        let listing = listing.unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "");
        assert!(listing[0].is_dir);
        assert_eq!(listing[1].name, "a");
    }

    #[test]
    fn error_info_prefers_server_message() {
        let error = FetchError::Status {
            status: 500,
            message: Some("Failed to read directory".to_owned()),
        };
        let info = ErrorInfo::from(&error);
        assert_eq!(info.message, "Failed to read directory");
        assert_eq!(info.status, Some(500));
    }

    #[test]
    fn error_info_falls_back_to_generic_message() {
        let error = FetchError::Status {
            status: 502,
            message: Some("  ".to_owned()),
        };
        assert_eq!(ErrorInfo::from(&error).message, FALLBACK_ERROR_MESSAGE);

        let error = FetchError::Unauthenticated { message: None };
        let info = ErrorInfo::from(&error);
        assert_eq!(info.message, FALLBACK_ERROR_MESSAGE);
        assert_eq!(info.status, Some(401));
    }

    #[test]
    fn error_info_describes_transport_failures() {
        let error = FetchError::Transport(anyhow::anyhow!("connection refused"));
        let info = ErrorInfo::from(&error);
        assert_eq!(info.message, "The server could not be reached");
        assert_eq!(info.status, None);
    }
}
