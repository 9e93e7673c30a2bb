//! Source files as read for one analysis session.
//!
//! A `Source` keeps the raw bytes next to the decoded text. Parsers that address
//! content by byte offset (tree-sitter) must slice the raw buffer, never the
//! decoded string, or multi-byte characters ahead of a node shift every name.

use crate::errors::{Result, RevealError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default read limit (2 MiB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// Hard ceiling applied even when the size limit is forced off
pub const FORCED_READ_CEILING: u64 = 256 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// How the raw bytes were decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Ascii,
    Utf8,
    /// UTF-8 with a byte order mark (stripped before parsing)
    Utf8Bom,
    /// Invalid sequences were replaced with U+FFFD
    Utf8Lossy,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Ascii => write!(f, "ASCII"),
            Encoding::Utf8 => write!(f, "UTF-8"),
            Encoding::Utf8Bom => write!(f, "UTF-8 (BOM)"),
            Encoding::Utf8Lossy => write!(f, "UTF-8 (lossy)"),
        }
    }
}

/// Read bounds for a single file
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub max_bytes: u64,
    pub force: bool,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_FILE_BYTES,
            force: false,
        }
    }
}

/// File-level facts every extractor can report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    pub name: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub encoding: Encoding,
    /// blake3 hex digest of the raw bytes
    pub content_hash: String,
}

/// Byte offset of every line start, for offset → line translation
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    line_count: usize,
}

impl LineIndex {
    pub fn new(bytes: &[u8], line_count: usize) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in bytes.iter().enumerate() {
            if *byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        Self { starts, line_count }
    }

    /// 1-based line containing `offset`, clamped to the last real line
    pub fn line_of(&self, offset: usize) -> u32 {
        let line = self.starts.partition_point(|start| *start <= offset);
        line.clamp(1, self.line_count.max(1)) as u32
    }

    /// Byte offset where a 1-based line starts
    pub fn line_start(&self, line: u32) -> Option<usize> {
        if line == 0 {
            return None;
        }
        self.starts.get(line as usize - 1).copied()
    }
}

/// One file's content, immutable for the analysis session
#[derive(Debug, Clone)]
pub struct Source {
    path: PathBuf,
    bytes: Vec<u8>,
    text: String,
    lines: Vec<String>,
    line_index: LineIndex,
    encoding: Encoding,
    replacements: usize,
    size_on_disk: u64,
}

impl Source {
    /// Read a file from disk, refusing (or truncating, when forced) oversized input
    pub fn read(path: &Path, limits: &ReadLimits) -> Result<Self> {
        let file = File::open(path).map_err(|e| RevealError::io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| RevealError::io(path, e))?
            .len();

        if size > limits.max_bytes && !limits.force {
            return Err(RevealError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: limits.max_bytes,
            });
        }

        let cap = if limits.force {
            FORCED_READ_CEILING
        } else {
            limits.max_bytes
        };
        if size > cap {
            warn!(
                path = %path.display(),
                "⚠️  File is {} bytes, truncating read at {} bytes", size, cap
            );
        }

        let mut bytes = Vec::with_capacity(size.min(cap) as usize);
        file.take(cap)
            .read_to_end(&mut bytes)
            .map_err(|e| RevealError::io(path, e))?;

        let mut source = Self::from_bytes(path, bytes);
        source.size_on_disk = size;
        Ok(source)
    }

    /// Build a source from in-memory bytes (decoding exactly as `read` does)
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        let path = path.into();
        let size_on_disk = bytes.len() as u64;

        let had_bom = bytes.starts_with(UTF8_BOM);
        let bytes = if had_bom {
            bytes[UTF8_BOM.len()..].to_vec()
        } else {
            bytes
        };

        let (text, encoding, replacements) = match std::str::from_utf8(&bytes) {
            Ok(text) => {
                let encoding = if had_bom {
                    Encoding::Utf8Bom
                } else if text.is_ascii() {
                    Encoding::Ascii
                } else {
                    Encoding::Utf8
                };
                (text.to_string(), encoding, 0)
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                let replacements = text.chars().filter(|c| *c == '\u{FFFD}').count();
                let err = RevealError::EncodingError {
                    path: path.clone(),
                    count: replacements,
                };
                warn!("⚠️  {}", err);
                (text, Encoding::Utf8Lossy, replacements)
            }
        };

        let lines: Vec<String> = text.lines().map(|line| line.to_string()).collect();
        let line_index = LineIndex::new(&bytes, lines.len());

        debug!(
            "Loaded {} ({} bytes, {} lines, {})",
            path.display(),
            bytes.len(),
            lines.len(),
            encoding
        );

        Self {
            path,
            bytes,
            text,
            lines,
            line_index,
            encoding,
            replacements,
            size_on_disk,
        }
    }

    /// Convenience constructor for string content
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self::from_bytes(path, text.as_bytes().to_vec())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes (BOM stripped) - the buffer byte offsets refer to
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Number of U+FFFD substitutions made while decoding
    pub fn replacements(&self) -> usize {
        self.replacements
    }

    /// 1-based line text
    pub fn line(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.lines.get(line as usize - 1).map(String::as_str)
    }

    /// Text of an inclusive 1-based line range, clamped to the file
    pub fn line_range_text(&self, start: u32, end: u32) -> String {
        if self.lines.is_empty() || start == 0 {
            return String::new();
        }
        let first = (start as usize - 1).min(self.lines.len() - 1);
        let last = (end.max(start) as usize).min(self.lines.len());
        self.lines[first..last].join("\n")
    }

    /// Text between two byte offsets of the raw buffer
    ///
    /// Offsets that are out of range yield an empty string instead of panicking.
    pub fn byte_text(&self, start: usize, end: usize) -> String {
        if start <= end && end <= self.bytes.len() {
            String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
        } else {
            String::new()
        }
    }

    /// First line as raw bytes (shebang sniffing)
    pub fn first_line_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|b| *b == b'\n')
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            path: self.path.to_string_lossy().replace('\\', "/"),
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_bytes: self.size_on_disk,
            line_count: self.lines.len(),
            encoding: self.encoding,
            content_hash: blake3::hash(&self.bytes).to_hex().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_line_index_maps_offsets_to_lines() {
        let source = Source::from_text("a.txt", "one\ntwo\nthree\n");
        let index = source.line_index();
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(3), 1); // the newline itself
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(8), 3);
        // Offset past the trailing newline clamps to the last line
        assert_eq!(index.line_of(14), 3);
        assert_eq!(index.line_start(2), Some(4));
    }

    #[test]
    fn test_invalid_utf8_is_substituted_not_fatal() {
        let source = Source::from_bytes("bad.txt", vec![b'o', b'k', b'\n', 0xFF, 0xFE, b'x']);
        assert_eq!(source.encoding(), Encoding::Utf8Lossy);
        assert_eq!(source.replacements(), 2);
        assert_eq!(source.line_count(), 2);
        assert!(source.line(2).unwrap().ends_with('x'));
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"key = 1\n");
        let source = Source::from_bytes("c.toml", bytes);
        assert_eq!(source.encoding(), Encoding::Utf8Bom);
        assert_eq!(source.bytes()[0], b'k');
    }

    #[test]
    fn test_byte_text_slices_raw_buffer() {
        // "é" is two bytes; byte offsets after it must still land on "name"
        let source = Source::from_text("x.py", "é = 1\nname");
        let start = source.bytes().len() - 4;
        assert_eq!(source.byte_text(start, start + 4), "name");
        assert_eq!(source.byte_text(5, 1), "");
        assert_eq!(source.byte_text(0, 999), "");
    }

    #[test]
    fn test_read_rejects_oversized_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.txt");
        fs::write(&path, "x".repeat(64)).unwrap();

        let limits = ReadLimits {
            max_bytes: 16,
            force: false,
        };
        let err = Source::read(&path, &limits).unwrap_err();
        assert!(matches!(err, RevealError::FileTooLarge { size: 64, .. }));

        let forced = ReadLimits {
            max_bytes: 16,
            force: true,
        };
        let source = Source::read(&path, &forced).unwrap();
        assert_eq!(source.bytes().len(), 64);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = Source::read(Path::new("/definitely/not/here.py"), &ReadLimits::default())
            .unwrap_err();
        assert!(matches!(err, RevealError::Io { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_line_range_text_clamps() {
        let source = Source::from_text("a.txt", "a\nb\nc");
        assert_eq!(source.line_range_text(2, 3), "b\nc");
        assert_eq!(source.line_range_text(2, 99), "b\nc");
        assert_eq!(source.line_range_text(3, 1), "c");
    }

    #[test]
    fn test_metadata_hash_is_stable() {
        let a = Source::from_text("a.txt", "same").metadata();
        let b = Source::from_text("b.txt", "same").metadata();
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.line_count, 1);
        assert_eq!(a.encoding, Encoding::Ascii);
        assert_eq!(b.name, "b.txt");
    }
}
