//! IR-independent rules an instrumentor follows when inserting coverage calls.
//!
//! An instrumentor walks its own IR and maps each function and block onto the
//! small descriptions here; the decisions (which functions to instrument, the
//! file path handed to the runtime, which blocks get an index) are made the
//! same way regardless of the compiler.

/// Index of a block within its function, as passed to `__record_bb_cov`.
pub type BlockIndex = u32;

/// Source paths containing this are treated as system code and skipped.
pub const DEFAULT_SYSTEM_PREFIX: &str = "/usr/bin";

/// `__cov_fini` goes before every return from this function.
pub const ENTRY_FUNCTION: &str = "main";

/// `__cov_fini` goes before every call to one of these.
pub const TERMINATION_CALLS: &[&str] = &["exit"];

/// Names of compiler-synthesized static initializers.
pub const STATIC_INITIALIZER_MARKERS: &[&str] = &["_GLOBAL__sub_I_", "__cxx_global_var_init"];

/// Debug association of a function: where its source lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLocation<'a> {
    pub directory: Option<&'a str>,
    pub filename: &'a str,
}

impl<'a> DebugLocation<'a> {
    pub fn file_path(&self) -> String {
        file_path(self.directory, self.filename)
    }
}

/// What the instrumentor knows about one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionInfo<'a> {
    /// Display (demangled) name.
    pub name: &'a str,
    pub is_intrinsic: bool,
    /// `None` when the function has no debug association.
    pub debug: Option<DebugLocation<'a>>,
}

/// Shape of a basic block as far as index assignment cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    /// Has at least one executable instruction after any metadata.
    Executable,
    /// Holds only debug/lifetime markers or phi nodes.
    MetadataOnly,
    /// Starts with an exception landing pad.
    LandingPad,
}

impl BlockShape {
    pub fn is_instrumented(self) -> bool {
        matches!(self, BlockShape::Executable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    system_prefix: String,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            system_prefix: DEFAULT_SYSTEM_PREFIX.to_string(),
        }
    }
}

impl EligibilityPolicy {
    pub fn with_system_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.system_prefix = prefix.into();
        self
    }

    pub fn system_prefix(&self) -> &str {
        &self.system_prefix
    }

    /// Whether `function` gets block instrumentation.
    pub fn is_eligible(&self, function: &FunctionInfo<'_>) -> bool {
        if function.is_intrinsic || is_static_initializer(function.name) {
            return false;
        }
        let Some(location) = function.debug else {
            return false;
        };
        !self.is_system_path(&location.file_path())
    }

    pub fn is_system_path(&self, path: &str) -> bool {
        !self.system_prefix.is_empty() && path.contains(&self.system_prefix)
    }
}

pub fn is_static_initializer(name: &str) -> bool {
    STATIC_INITIALIZER_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

/// File path handed to the runtime: `directory/filename`, or `filename` alone
/// when no directory is known.
pub fn file_path(directory: Option<&str>, filename: &str) -> String {
    match directory {
        Some(dir) if !dir.is_empty() => format!("{dir}/{filename}"),
        _ => filename.to_string(),
    }
}

/// Whether returns from `name` need a `__cov_fini` call. Holds for the entry
/// function even when it is not itself eligible for block instrumentation.
pub fn is_entry_function(name: &str) -> bool {
    name == ENTRY_FUNCTION
}

pub fn is_termination_call(callee: &str) -> bool {
    TERMINATION_CALLS.contains(&callee)
}

/// Indices handed out to the blocks of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockAssignment {
    indices: Vec<Option<BlockIndex>>,
    capacity: usize,
}

impl BlockAssignment {
    /// Index of the block at `position`, `None` when it is not instrumented.
    pub fn index(&self, position: usize) -> Option<BlockIndex> {
        self.indices.get(position).copied().flatten()
    }

    pub fn indices(&self) -> &[Option<BlockIndex>] {
        &self.indices
    }

    /// One past the highest index handed out.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn instrumented(&self) -> usize {
        self.indices.iter().filter(|idx| idx.is_some()).count()
    }
}

/// Number the instrumented blocks of a function 0..N-1 in visiting order.
pub fn assign_block_indices(blocks: &[BlockShape]) -> BlockAssignment {
    assign_block_indices_from(0, blocks)
}

/// Like [`assign_block_indices`], continuing from `start`. Used when two
/// functions share a display name and therefore one flag sequence.
pub fn assign_block_indices_from(start: usize, blocks: &[BlockShape]) -> BlockAssignment {
    let mut next = start;
    let indices = blocks
        .iter()
        .map(|shape| {
            shape.is_instrumented().then(|| {
                let idx = next as BlockIndex;
                next += 1;
                idx
            })
        })
        .collect();
    BlockAssignment {
        indices,
        capacity: next,
    }
}
