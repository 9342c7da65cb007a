//! Checksummed binary artifact files with atomic replacement.
//!
//! Each artifact is stored at `<root>/<subdir>/<key>.bin` as a 4-byte
//! little-endian header length, a bincode-encoded [`ArtifactHeader`], and the
//! payload. Writes go to a temporary file in the same directory that is then
//! renamed over the target, so readers never observe a partial artifact.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tsforge_common::{ContentHash, CACHE_FORMAT_VERSION};

use crate::error::CacheError;

/// Magic bytes identifying a tsforge cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"TSFG";

/// File extension of artifact files.
const ARTIFACT_EXT: &str = "bin";

/// Upper bound on the decoded size of an [`ArtifactHeader`].
const MAX_HEADER_BYTES: usize = 4096;

/// Header prepended to every artifact for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"TSFG"`.
    pub magic: [u8; 4],

    /// Cache format version.
    pub format_version: u32,

    /// Version of the compiler service that produced the payload.
    pub tool_version: String,

    /// Content hash of the payload, for integrity checks.
    pub checksum: ContentHash,
}

/// Reads and writes artifacts below one cache namespace directory.
pub struct ArtifactStore {
    root: PathBuf,
    tool_version: String,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. Nothing is created on disk until
    /// the first write.
    pub fn new(root: &Path, tool_version: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            tool_version: tool_version.to_string(),
        }
    }

    /// The directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path for an artifact.
    pub fn artifact_path(&self, subdir: &str, key: &str) -> PathBuf {
        self.root.join(subdir).join(format!("{key}.{ARTIFACT_EXT}"))
    }

    /// Writes `data` as the artifact `key`, replacing any previous version.
    pub fn write_artifact(
        &self,
        subdir: &str,
        key: &str,
        data: &[u8],
    ) -> Result<PathBuf, CacheError> {
        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: CACHE_FORMAT_VERSION,
            tool_version: self.tool_version.clone(),
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.artifact_path(subdir, key);
        write_atomic(&path, &output)?;
        Ok(path)
    }

    /// Reads an artifact and validates its header and checksum.
    pub fn read_artifact(&self, subdir: &str, key: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.artifact_path(subdir, key);
        let raw = std::fs::read(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;

        let invalid = |reason: &str| CacheError::InvalidHeader {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let len_bytes: [u8; 4] = raw
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("truncated header length"))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_bytes = raw
            .get(4..4 + header_len)
            .ok_or_else(|| invalid("truncated header"))?;

        // The header is not covered by the checksum, so a damaged length
        // prefix must not turn into an allocation.
        let limited = bincode::config::standard().with_limit::<MAX_HEADER_BYTES>();
        let (header, _): (ArtifactHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, limited)
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(invalid("bad magic bytes"));
        }
        if header.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: CACHE_FORMAT_VERSION,
                actual: header.format_version,
            });
        }
        if header.tool_version != self.tool_version {
            return Err(CacheError::ToolMismatch {
                path,
                expected: self.tool_version.clone(),
                actual: header.tool_version,
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(payload.to_vec())
    }

    /// Removes artifacts in `subdir` whose key is not in `live_keys`, along
    /// with temporary files left behind by interrupted writes.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, subdir: &str, live_keys: &BTreeSet<&str>) -> Result<usize, CacheError> {
        let dir = self.root.join(subdir);
        if !dir.exists() {
            return Ok(0);
        }

        let io_err = |path: &Path, e: std::io::Error| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut removed = 0;
        for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
            let path = entry.map_err(|e| io_err(&dir, e))?.path();
            let is_artifact = path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let dead = if is_artifact {
                !live_keys.contains(stem)
            } else {
                stem.starts_with(".tmp")
            };
            if dead {
                std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Replaces `path` with `bytes` via a temporary file and rename.
///
/// Creates the parent directory if needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |p: &Path, e: std::io::Error| CacheError::Io {
        path: p.to_path_buf(),
        source: e,
    };

    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}
