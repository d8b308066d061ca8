//! Bounded access to an uploaded zip/jar container.
//!
//! All size limits are checked against the central directory before a single
//! entry is inflated. A container whose only file is itself a jar or zip is
//! unwrapped exactly once.

use memmap2::Mmap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

use crate::config::Limits;
use crate::error::ArchiveError;

/// Where the archive bytes come from.
pub enum ArchiveSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send>),
}

impl From<&Path> for ArchiveSource {
    fn from(path: &Path) -> Self {
        ArchiveSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        ArchiveSource::Path(path)
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(bytes: Vec<u8>) -> Self {
        ArchiveSource::Bytes(bytes)
    }
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

#[derive(Clone)]
struct SharedBytes(Arc<Backing>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        match self.0.as_ref() {
            Backing::Mapped(m) => &m[..],
            Backing::Owned(v) => v.as_slice(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub index: usize,
    pub name: String,
    pub compressed_size: u64,
    pub size: u64,
}

impl ArchiveEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_class(&self) -> bool {
        !self.is_dir() && self.name.ends_with(".class")
    }

    fn is_container(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        !self.is_dir() && (lower.ends_with(".jar") || lower.ends_with(".zip"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub sha256: String,
    pub size_bytes: u64,
    pub entry_count: usize,
    /// Name of the inner container when one nesting level was unwrapped.
    pub nested: Option<String>,
}

pub struct Archive {
    zip: ZipArchive<Cursor<SharedBytes>>,
    entries: Vec<ArchiveEntry>,
    limits: Limits,
    summary: ArchiveSummary,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries.len())
            .field("summary", &self.summary)
            .finish()
    }
}

impl Archive {
    pub fn open(source: impl Into<ArchiveSource>, limits: Limits) -> Result<Self, ArchiveError> {
        let backing = load_backing(source.into(), &limits)?;
        let shared = SharedBytes(Arc::new(backing));
        let raw = shared.as_ref();
        let sha256 = hex::encode(Sha256::digest(raw));
        let size_bytes = raw.len() as u64;

        let (zip, entries) = index_container(shared, &limits)?;
        let mut archive = Self {
            summary: ArchiveSummary {
                sha256,
                size_bytes,
                entry_count: entries.len(),
                nested: None,
            },
            zip,
            entries,
            limits,
        };

        if let Some(inner) = archive.single_nested_container() {
            debug!(entry = %inner.name, "descending into nested container");
            let bytes = archive.read(&inner)?;
            let (zip, entries) = index_container(SharedBytes(Arc::new(Backing::Owned(bytes))), &limits)?;
            archive.zip = zip;
            archive.summary.entry_count = entries.len();
            archive.entries = entries;
            archive.summary.nested = Some(inner.name);
        }

        Ok(archive)
    }

    /// Entry descriptors in container order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn summary(&self) -> &ArchiveSummary {
        &self.summary
    }

    pub fn fingerprint(&self) -> &str {
        &self.summary.sha256
    }

    /// Inflate a single entry.
    ///
    /// The output is capped at the declared size, so a forged header can
    /// never produce more than `max_entry_bytes`.
    pub fn read(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
        if entry.size > self.limits.max_entry_bytes {
            return Err(ArchiveError::EntryTooLarge {
                name: entry.name.clone(),
                size: entry.size,
                max: self.limits.max_entry_bytes,
            });
        }

        // Cloning shares the parsed central directory; only the cursor is copied.
        let mut zip = self.zip.clone();
        let file = zip.by_index(entry.index)?;
        let mut buf = Vec::with_capacity(entry.size as usize);
        file.take(entry.size).read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_by_name(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        match self.entry(name) {
            Some(entry) => self.read(entry).map(Some),
            None => Ok(None),
        }
    }

    fn single_nested_container(&self) -> Option<ArchiveEntry> {
        let mut files = self.entries.iter().filter(|e| !e.is_dir());
        let only = files.next()?;
        if files.next().is_some() || !only.is_container() {
            return None;
        }
        Some(only.clone())
    }
}

fn load_backing(source: ArchiveSource, limits: &Limits) -> Result<Backing, ArchiveError> {
    let too_large = |actual: u64| ArchiveError::TooLarge {
        limit: "max_archive_bytes",
        actual,
        max: limits.max_archive_bytes,
    };

    match source {
        ArchiveSource::Path(path) => {
            let file = File::open(&path)?;
            let len = file.metadata()?.len();
            if len > limits.max_archive_bytes {
                return Err(too_large(len));
            }
            // SAFETY: The file is opened read-only and the mapping is owned by
            // the archive; it is never written through.
            let mmap = unsafe { Mmap::map(&file) }?;
            Ok(Backing::Mapped(mmap))
        }
        ArchiveSource::Bytes(bytes) => {
            let len = bytes.len() as u64;
            if len > limits.max_archive_bytes {
                return Err(too_large(len));
            }
            Ok(Backing::Owned(bytes))
        }
        ArchiveSource::Reader(reader) => {
            let mut bytes = Vec::new();
            reader
                .take(limits.max_archive_bytes.saturating_add(1))
                .read_to_end(&mut bytes)?;
            let len = bytes.len() as u64;
            if len > limits.max_archive_bytes {
                return Err(too_large(len));
            }
            Ok(Backing::Owned(bytes))
        }
    }
}

fn index_container(
    shared: SharedBytes,
    limits: &Limits,
) -> Result<(ZipArchive<Cursor<SharedBytes>>, Vec<ArchiveEntry>), ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(shared))
        .map_err(|e| ArchiveError::Unreadable(e.to_string()))?;

    if zip.len() > limits.max_entries {
        return Err(ArchiveError::TooLarge {
            limit: "max_entries",
            actual: zip.len() as u64,
            max: limits.max_entries as u64,
        });
    }

    let mut entries = Vec::with_capacity(zip.len());
    let mut total = 0u64;
    for index in 0..zip.len() {
        let file = zip
            .by_index_raw(index)
            .map_err(|e| ArchiveError::Unreadable(e.to_string()))?;
        total = total.saturating_add(file.size());
        entries.push(ArchiveEntry {
            index,
            name: file.name().to_string(),
            compressed_size: file.compressed_size(),
            size: file.size(),
        });
    }

    if total > limits.max_total_uncompressed_bytes {
        return Err(ArchiveError::TooLarge {
            limit: "max_total_uncompressed_bytes",
            actual: total,
            max: limits.max_total_uncompressed_bytes,
        });
    }

    Ok((zip, entries))
}
