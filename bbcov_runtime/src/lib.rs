//! Basic-block coverage runtime.
//!
//! Linked into an instrumented program, this crate collects which basic
//! blocks were entered during one execution and, at every exit point, merges
//! that into a plain-text `<source>.cov` store next to each source file.
//! Stores accumulate coverage across runs; a flag that was ever set stays set.

pub mod config;
pub mod error;
pub mod ffi;
pub mod flags;
pub mod lock;
pub mod merge;
pub mod recorder;
pub mod store;

pub use config::{MismatchPolicy, RuntimeConfig};
pub use error::{ParseStopReason, StoreError, StoreParseInconsistency, StoreResult};
pub use ffi::{finalize, record, reset};
pub use flags::BlockFlags;
pub use merge::{merge_store_files, FileOutcome, FinalizeReport, StoreMergeSummary};
pub use recorder::{CoverageRegistry, SlotId, SourceFileCoverage};
pub use store::{store_path, CoverageStore, ParsedStore};
