//! Finalize: fold one run's coverage into the persisted stores.
//!
//! For every source file the run touched, the prior store is read (missing or
//! unreadable means empty), OR-merged with the in-memory flags and rewritten
//! in full. A flag that was ever `true` stays `true`, and a function's block
//! sequence only ever grows. Running the merge again with nothing new
//! recorded rewrites identical content.
//!
//! Nothing here reports failure to the instrumented program: I/O errors are
//! logged and the affected file is skipped.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{MismatchPolicy, RuntimeConfig};
use crate::error::{StoreError, StoreParseInconsistency, StoreResult};
use crate::lock::StoreLock;
use crate::recorder::{CoverageRegistry, SourceFileCoverage};
use crate::store::{store_path, CoverageStore, ParsedStore, MERGE_BLOCK_MARKER};

/// What happened to one store during finalize.
#[derive(Debug)]
pub enum FileOutcome {
    Written,
    /// Left untouched under [`MismatchPolicy::Skip`].
    SkippedMismatch { function: String },
    /// The rewrite failed; this run's coverage for the file is lost.
    WriteFailed(StoreError),
}

#[derive(Debug, Default)]
pub struct FinalizeReport {
    pub files: Vec<(PathBuf, FileOutcome)>,
}

impl FinalizeReport {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().filter_map(|(path, outcome)| match outcome {
            FileOutcome::Written => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn outcome(&self, store: &Path) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|(path, _)| path == store)
            .map(|(_, outcome)| outcome)
    }
}

/// Merge every file of `registry` into its store.
pub fn finalize(registry: &CoverageRegistry, config: &RuntimeConfig) -> FinalizeReport {
    let mut report = FinalizeReport::default();
    for file in registry.files() {
        let path = store_path(file.path());
        let outcome = merge_file(file, &path, config);
        report.files.push((path, outcome));
    }
    report
}

fn merge_file(file: &SourceFileCoverage, path: &Path, config: &RuntimeConfig) -> FileOutcome {
    let _guard = if config.lock { lock_store(path) } else { None };

    let mut merged = load_prior(path);

    if config.mismatch == MismatchPolicy::Skip {
        if let Some(function) = first_mismatch(&merged, file) {
            warn!(
                store = %path.display(),
                function = %function,
                "Run saw more blocks than the store holds, leaving store untouched"
            );
            return FileOutcome::SkippedMismatch { function };
        }
    }

    for (name, flags) in file.functions() {
        merged.merge_function(name, flags);
    }

    match merged.write(path, MERGE_BLOCK_MARKER) {
        Ok(()) => {
            debug!(
                store = %path.display(),
                functions = merged.len(),
                covered_blocks = merged.covered_blocks(),
                "Coverage store updated"
            );
            FileOutcome::Written
        }
        Err(err) => {
            warn!(error = %err, "Dropping this run's coverage update");
            FileOutcome::WriteFailed(err)
        }
    }
}

fn lock_store(path: &Path) -> Option<StoreLock> {
    match StoreLock::acquire(path) {
        Ok(guard) => Some(guard),
        Err(err) => {
            warn!(store = %path.display(), error = %err, "Failed to lock store, merging unlocked");
            None
        }
    }
}

/// Prior state of the store at `path`, empty when it cannot be read.
fn load_prior(path: &Path) -> CoverageStore {
    match CoverageStore::load(path) {
        Ok(parsed) => {
            log_parse_issues(path, &parsed);
            parsed.store
        }
        Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(store = %path.display(), "No prior store");
            CoverageStore::new()
        }
        Err(err) => {
            warn!(error = %err, "Prior store unreadable, merging against empty state");
            CoverageStore::new()
        }
    }
}

fn log_parse_issues(path: &Path, parsed: &ParsedStore) {
    for skipped in &parsed.skipped {
        debug!(
            store = %path.display(),
            line = skipped.line,
            reason = %skipped.reason,
            "Skipped unusable store line"
        );
    }
    if let Some(stop) = &parsed.stopped {
        debug!(
            store = %path.display(),
            line = stop.line,
            reason = %stop.reason,
            "Stopped reading malformed store, remainder dropped"
        );
    }
}

/// First function that this run saw more blocks for than the existing store.
fn first_mismatch(prior: &CoverageStore, file: &SourceFileCoverage) -> Option<String> {
    file.functions().find_map(|(name, flags)| {
        prior
            .function(name)
            .filter(|stored| flags.len() > stored.len())
            .map(|_| name.to_string())
    })
}

/// Summary of an offline merge between two store files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMergeSummary {
    pub functions: usize,
    pub covered_functions: usize,
    pub covered_blocks: usize,
    pub source_stopped: Option<StoreParseInconsistency>,
    pub target_stopped: Option<StoreParseInconsistency>,
}

/// OR-merge the store at `source` into the store at `target`.
///
/// Unlike finalize this is an explicit operation, so an unreadable `source`
/// and a failed write are errors. A missing `target` is created.
pub fn merge_store_files(
    source: &Path,
    target: &Path,
    config: &RuntimeConfig,
) -> StoreResult<StoreMergeSummary> {
    let incoming = CoverageStore::load(source)?;
    log_parse_issues(source, &incoming);

    let _guard = if config.lock { lock_store(target) } else { None };

    let (mut merged, target_stopped) = match CoverageStore::load(target) {
        Ok(parsed) => {
            log_parse_issues(target, &parsed);
            (parsed.store, parsed.stopped)
        }
        Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            (CoverageStore::new(), None)
        }
        Err(err) => return Err(err),
    };

    merged.merge(&incoming.store);
    merged.write(target, MERGE_BLOCK_MARKER)?;

    Ok(StoreMergeSummary {
        functions: merged.len(),
        covered_functions: merged.covered_functions(),
        covered_blocks: merged.covered_blocks(),
        source_stopped: incoming.stopped,
        target_stopped,
    })
}
