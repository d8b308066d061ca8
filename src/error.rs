//! Error types for archive reading, metadata extraction and class decoding.
//!
//! Every variant carries a stable `code()` so a presentation layer can map
//! it to a localized message without parsing the display text.

use serde::Serialize;
use thiserror::Error;

use crate::platform::Platform;

/// Fatal failures while opening or reading the uploaded container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive is not a readable zip container: {0}")]
    Unreadable(String),

    #[error("archive exceeds the {limit} limit ({actual} > {max})")]
    TooLarge {
        limit: &'static str,
        actual: u64,
        max: u64,
    },

    #[error("entry {name} declares {size} bytes, limit is {max}")]
    EntryTooLarge { name: String, size: u64, max: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn code(&self) -> &'static str {
        match self {
            ArchiveError::Unreadable(_) => "archive.unreadable",
            ArchiveError::TooLarge { .. } => "archive.too_large",
            ArchiveError::EntryTooLarge { .. } => "archive.entry_too_large",
            ArchiveError::Io(_) => "archive.io",
        }
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::Unreadable(other.to_string()),
        }
    }
}

/// Failures that reject metadata extraction. No partial metadata is ever
/// returned alongside one of these.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("no supported platform descriptor found")]
    NotFound,

    #[error(
        "{} metadata is missing required field `{field}`",
        .platform.map_or_else(|| "plugin".to_string(), |p| p.to_string())
    )]
    Incomplete {
        platform: Option<Platform>,
        field: &'static str,
    },

    #[error("platforms disagree on `{field}`: {values:?}")]
    Inconsistent {
        field: &'static str,
        values: Vec<String>,
    },

    #[error("{platform} descriptor {entry} is malformed: {reason}")]
    DescriptorMalformed {
        platform: Platform,
        entry: String,
        reason: String,
    },

    #[error("{platform} version `{version}` is not a valid version string")]
    InvalidVersion { platform: Platform, version: String },

    #[error("metadata extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl MetaError {
    pub fn code(&self) -> &'static str {
        match self {
            MetaError::NotFound => "meta.not_found",
            MetaError::Incomplete { .. } => "meta.incomplete",
            MetaError::Inconsistent { .. } => "meta.inconsistent",
            MetaError::DescriptorMalformed { .. } => "meta.descriptor_malformed",
            MetaError::InvalidVersion { .. } => "meta.invalid_version",
            MetaError::Cancelled => "meta.cancelled",
            MetaError::Archive(inner) => inner.code(),
        }
    }
}

/// Top-level failure of a combined inspection.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Meta(MetaError),

    #[error("inspection cancelled or timed out")]
    Cancelled,
}

impl InspectError {
    pub fn code(&self) -> &'static str {
        match self {
            InspectError::Archive(inner) => inner.code(),
            InspectError::Meta(inner) => inner.code(),
            InspectError::Cancelled => "inspect.timeout",
        }
    }
}

impl From<MetaError> for InspectError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Archive(inner) => InspectError::Archive(inner),
            MetaError::Cancelled => InspectError::Cancelled,
            other => InspectError::Meta(other),
        }
    }
}

/// A single class entry that could not be decoded. Never fatal to a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{entry}: {reason}")]
pub struct ClassParseFailure {
    pub entry: String,
    pub reason: String,
}

impl ClassParseFailure {
    pub fn new(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_error_codes_are_stable() {
        let err = ArchiveError::TooLarge {
            limit: "max_entries",
            actual: 10,
            max: 5,
        };
        assert_eq!(err.code(), "archive.too_large");
        assert!(err.to_string().contains("max_entries"));
        assert_eq!(
            ArchiveError::Unreadable("bad".into()).code(),
            "archive.unreadable"
        );
    }

    #[test]
    fn incomplete_without_platform_displays_field() {
        let err = MetaError::Incomplete {
            platform: None,
            field: "version",
        };
        assert_eq!(err.code(), "meta.incomplete");
        assert!(err.to_string().contains("`version`"));
    }

    #[test]
    fn meta_archive_error_unwraps_into_inspect_archive() {
        let err: InspectError = MetaError::Archive(ArchiveError::Unreadable("x".into())).into();
        assert!(matches!(err, InspectError::Archive(_)));
        assert_eq!(err.code(), "archive.unreadable");

        let err: InspectError = MetaError::NotFound.into();
        assert_eq!(err.code(), "meta.not_found");

        let err: InspectError = MetaError::Cancelled.into();
        assert!(matches!(err, InspectError::Cancelled));
    }

    #[test]
    fn zip_io_error_maps_to_io_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: ArchiveError = zip::result::ZipError::Io(io).into();
        assert!(matches!(err, ArchiveError::Io(_)));

        let err: ArchiveError = zip::result::ZipError::InvalidArchive("bad cd").into();
        assert!(matches!(err, ArchiveError::Unreadable(_)));
    }
}
