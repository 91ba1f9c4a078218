//! Process-wide registry and the C ABI the instrumentor calls into.
//!
//! ```c
//! void __record_bb_cov(const char *file, const char *func, uint32_t index);
//! void __cov_fini(void);
//! ```
//!
//! Both entry points swallow every failure, including panics, so nothing
//! unwinds into the instrumented program.

use std::collections::HashMap;
use std::ffi::CStr;
use std::path::PathBuf;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::RuntimeConfig;
use crate::merge::FinalizeReport;
use crate::recorder::{CoverageRegistry, SlotId};

struct Runtime {
    registry: CoverageRegistry,
    /// (file pointer, function pointer) -> slot, for call sites that pass
    /// the same string constants on every call.
    sites: HashMap<(usize, usize), SlotId>,
    config: RuntimeConfig,
}

impl Runtime {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            registry: CoverageRegistry::new(),
            sites: HashMap::new(),
            config,
        }
    }

    /// # Safety
    /// Both pointers must be non-null and point to NUL-terminated strings
    /// that stay valid and unchanged for the rest of the process.
    unsafe fn record_site(&mut self, file: *const c_char, function: *const c_char, index: usize) {
        let key = (file as usize, function as usize);
        let slot = match self.sites.get(&key) {
            Some(&slot) => slot,
            None => {
                let file = c_path(CStr::from_ptr(file));
                let function = CStr::from_ptr(function).to_string_lossy();
                let slot = self.registry.slot(&file, &function);
                self.sites.insert(key, slot);
                slot
            }
        };
        self.registry.record_slot(slot, index);
    }
}

/// Source path bytes as the filesystem sees them.
#[cfg(unix)]
fn c_path(raw: &CStr) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(raw.to_bytes()))
}

#[cfg(not(unix))]
fn c_path(raw: &CStr) -> PathBuf {
    PathBuf::from(raw.to_string_lossy().into_owned())
}

static RUNTIME: Lazy<Mutex<Runtime>> =
    Lazy::new(|| Mutex::new(Runtime::new(RuntimeConfig::from_env())));

/// Record that `block_index` of `function` in `file` was entered.
pub fn record(file: &str, function: &str, block_index: usize) {
    RUNTIME.lock().registry.record(file, function, block_index);
}

/// Merge everything recorded so far into the stores. Safe to call any
/// number of times; the in-memory registry is kept.
pub fn finalize() -> FinalizeReport {
    let runtime = RUNTIME.lock();
    let report = runtime.registry.finalize(&runtime.config);
    debug!(files = report.files.len(), "Coverage finalized");
    report
}

/// Discard everything recorded so far, for harnesses that run several
/// iterations inside one process.
pub fn reset() {
    let mut runtime = RUNTIME.lock();
    runtime.registry = CoverageRegistry::new();
    runtime.sites.clear();
}

/// Replace the options read from the environment.
pub fn set_config(config: RuntimeConfig) {
    RUNTIME.lock().config = config;
}

/// Snapshot of the process-wide registry.
pub fn snapshot() -> CoverageRegistry {
    RUNTIME.lock().registry.clone()
}

/// Called by instrumented code on entry to every eligible basic block.
///
/// Null pointers are ignored. On Unix the file path is kept byte for byte;
/// function names that are not UTF-8 are converted lossily.
///
/// # Safety
/// Non-null `file` and `func` must point to NUL-terminated strings that stay
/// valid and unchanged for the lifetime of the process, such as the string
/// constants an instrumentor emits.
#[no_mangle]
pub unsafe extern "C" fn __record_bb_cov(file: *const c_char, func: *const c_char, index: u32) {
    if file.is_null() || func.is_null() {
        return;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        RUNTIME.lock().record_site(file, func, index as usize);
    }));
    if result.is_err() {
        error!("Panic while recording block coverage");
    }
}

/// Called by instrumented code before every exit point of the program.
#[no_mangle]
pub extern "C" fn __cov_fini() {
    if panic::catch_unwind(|| {
        finalize();
    })
    .is_err()
    {
        error!("Panic while finalizing coverage");
    }
}
