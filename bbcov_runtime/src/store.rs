//! On-disk coverage store format.
//!
//! One plain-text file per source file, named `<source path>.cov`:
//!
//! ```text
//! F <function name> <aggregate>
//! <marker> <block index> <flag>
//! ```
//!
//! Flags are written as `1`/`0` and read by exact match against `1`. The
//! block marker is free-form: a reader only distinguishes `F` headers from
//! everything else. Function names may contain spaces, so a line is split at
//! its first and last space.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ParseStopReason, StoreError, StoreParseInconsistency, StoreResult};
use crate::flags::{BlockFlags, MAX_BLOCK_INDEX};

pub const STORE_SUFFIX: &str = ".cov";
pub const FUNCTION_MARKER: &str = "F";
/// Block marker used by build-time templates.
pub const TEMPLATE_BLOCK_MARKER: &str = "b";
/// Block marker used when a merge rewrites a store.
pub const MERGE_BLOCK_MARKER: &str = "B";

const FLAG_TRUE: &str = "1";
const FLAG_FALSE: &str = "0";

/// Path of the store belonging to `source_path`.
pub fn store_path(source_path: impl AsRef<Path>) -> PathBuf {
    let mut path = source_path.as_ref().as_os_str().to_os_string();
    path.push(STORE_SUFFIX);
    PathBuf::from(path)
}

/// Coverage of one source file, keyed by function display name.
///
/// Functions iterate in name order so rewritten stores diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageStore {
    functions: BTreeMap<String, BlockFlags>,
}

/// Result of parsing a store, including where parsing gave up, if it did.
#[derive(Debug, Clone, Default)]
pub struct ParsedStore {
    pub store: CoverageStore,
    pub stopped: Option<StoreParseInconsistency>,
    /// Lines passed over without stopping.
    pub skipped: Vec<StoreParseInconsistency>,
}

impl CoverageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&BlockFlags> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &BlockFlags)> {
        self.functions.iter().map(|(name, flags)| (name.as_str(), flags))
    }

    /// Flags for `name`, creating an empty entry on first use.
    pub fn function_mut(&mut self, name: &str) -> &mut BlockFlags {
        self.functions.entry(name.to_string()).or_default()
    }

    /// Replace the flags of `name` outright. Used for templates only.
    pub fn insert_function(&mut self, name: impl Into<String>, flags: BlockFlags) {
        self.functions.insert(name.into(), flags);
    }

    /// OR `flags` into the entry for `name`.
    pub fn merge_function(&mut self, name: &str, flags: &BlockFlags) {
        self.function_mut(name).merge(flags);
    }

    /// OR every function of `other` into this store.
    pub fn merge(&mut self, other: &CoverageStore) {
        for (name, flags) in other.functions() {
            self.merge_function(name, flags);
        }
    }

    pub fn covered_functions(&self) -> usize {
        self.functions.values().filter(|flags| flags.is_covered()).count()
    }

    pub fn covered_blocks(&self) -> usize {
        self.functions.values().map(BlockFlags::covered_count).sum()
    }

    /// Parse store text, stopping at the first line that does not fit the
    /// format. Everything parsed before that line is kept.
    ///
    /// Block lines before any header belong to the function with the empty
    /// name. A block line whose index is above [`MAX_BLOCK_INDEX`] is skipped
    /// on its own.
    pub fn parse(text: &str) -> ParsedStore {
        let mut parsed = ParsedStore::default();
        let mut current = String::new();

        for (line_no, line) in text.lines().enumerate() {
            let issue = |reason| StoreParseInconsistency {
                line: line_no + 1,
                reason,
            };

            let Some((marker, middle, flag)) = split_line(line) else {
                parsed.stopped = Some(issue(ParseStopReason::MissingTokens));
                break;
            };

            if marker == FUNCTION_MARKER {
                // The stored aggregate is recomputed on write.
                parsed.store.function_mut(middle);
                current = middle.to_string();
                continue;
            }

            let index = match parse_index(middle) {
                IndexToken::Valid(index) => index,
                IndexToken::OutOfRange => {
                    parsed
                        .skipped
                        .push(issue(ParseStopReason::IndexOutOfRange(middle.to_string())));
                    continue;
                }
                IndexToken::Invalid => {
                    parsed.stopped = Some(issue(ParseStopReason::InvalidIndex(middle.to_string())));
                    break;
                }
            };
            parsed
                .store
                .function_mut(&current)
                .or_at(index, flag == FLAG_TRUE);
        }

        parsed
    }

    /// Render the store, writing `block_marker` at the start of each block line.
    pub fn render(&self, block_marker: &str) -> String {
        let mut out = String::new();
        for (name, flags) in &self.functions {
            let _ = writeln!(
                out,
                "{FUNCTION_MARKER} {name} {}",
                flag_token(flags.is_covered())
            );
            for (index, flag) in flags.iter().enumerate() {
                let _ = writeln!(out, "{block_marker} {index} {}", flag_token(flag));
            }
        }
        out
    }

    /// Read and parse the store at `path`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the damaged line then
    /// stops parsing like any other malformed line.
    pub fn load(path: &Path) -> StoreResult<ParsedStore> {
        let bytes = fs::read(path).map_err(|err| StoreError::io(path, err))?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Replace the store at `path`. The previous content stays intact until
    /// the new content is completely written.
    pub fn write(&self, path: &Path, block_marker: &str) -> StoreResult<()> {
        let text = self.render(block_marker);
        replace_file(path, |file| file.write_all(text.as_bytes()))
    }
}

/// Fill a sibling temp file with `fill`, then rename it over `path`. A failure
/// at any step leaves `path` untouched and removes the temp file.
fn replace_file<F>(path: &Path, fill: F) -> StoreResult<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|err| StoreError::io(path, err))?;
    if let Ok(meta) = fs::metadata(path) {
        let _ = tmp.as_file().set_permissions(meta.permissions());
    }
    fill(tmp.as_file_mut()).map_err(|err| StoreError::io(path, err))?;
    tmp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;
    Ok(())
}

enum IndexToken {
    Valid(usize),
    /// All digits, but above [`MAX_BLOCK_INDEX`].
    OutOfRange,
    Invalid,
}

fn parse_index(token: &str) -> IndexToken {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return IndexToken::Invalid;
    }
    match token.parse::<usize>() {
        Ok(index) if index <= MAX_BLOCK_INDEX => IndexToken::Valid(index),
        _ => IndexToken::OutOfRange,
    }
}

fn flag_token(value: bool) -> &'static str {
    if value {
        FLAG_TRUE
    } else {
        FLAG_FALSE
    }
}

/// Split `line` into (marker, middle, last) at its first and last space.
fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let first = line.find(' ')?;
    let last = line.rfind(' ')?;
    if first == last {
        return None;
    }
    Some((&line[..first], &line[first + 1..last], &line[last + 1..]))
}
