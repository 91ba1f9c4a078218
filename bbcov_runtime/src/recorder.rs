//! In-memory coverage for one execution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::RuntimeConfig;
use crate::flags::BlockFlags;
use crate::merge::{self, FinalizeReport};
use crate::store::CoverageStore;

/// Stable handle to one (file, function) entry of a [`CoverageRegistry`].
///
/// Resolving a handle once and recording through it skips both name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    file: usize,
    function: usize,
}

/// Functions observed in one source file during this run.
#[derive(Debug, Clone)]
pub struct SourceFileCoverage {
    path: PathBuf,
    functions: Vec<(String, BlockFlags)>,
    by_name: HashMap<String, usize>,
}

impl SourceFileCoverage {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            functions: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Source path exactly as the instrumentor passed it.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn function(&self, name: &str) -> Option<&BlockFlags> {
        self.by_name.get(name).map(|&idx| &self.functions[idx].1)
    }

    /// Functions in first-observation order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &BlockFlags)> {
        self.functions
            .iter()
            .map(|(name, flags)| (name.as_str(), flags))
    }

    /// This run's coverage as a store, ready to be merged with a persisted one.
    pub fn to_store(&self) -> CoverageStore {
        let mut store = CoverageStore::new();
        for (name, flags) in self.functions() {
            store.merge_function(name, flags);
        }
        store
    }

    fn slot(&mut self, function: &str) -> usize {
        if let Some(&idx) = self.by_name.get(function) {
            return idx;
        }
        let idx = self.functions.len();
        self.functions.push((function.to_string(), BlockFlags::new()));
        self.by_name.insert(function.to_string(), idx);
        idx
    }
}

/// Registry of every block entered during this execution, grouped by source
/// file and function.
///
/// Function identity is the display name handed over by the instrumentor.
/// Distinct functions that render to the same name (overloads, template
/// instances whose names collapse) share one entry.
#[derive(Debug, Clone, Default)]
pub struct CoverageRegistry {
    files: Vec<SourceFileCoverage>,
    by_path: HashMap<PathBuf, usize>,
}

impl CoverageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve the entry for `(file, function)`, creating it on first use.
    pub fn slot(&mut self, file: impl AsRef<Path>, function: &str) -> SlotId {
        let file = file.as_ref();
        let file_idx = match self.by_path.get(file) {
            Some(&idx) => idx,
            None => {
                let idx = self.files.len();
                self.files.push(SourceFileCoverage::new(file.to_path_buf()));
                self.by_path.insert(file.to_path_buf(), idx);
                idx
            }
        };
        let function_idx = self.files[file_idx].slot(function);
        SlotId {
            file: file_idx,
            function: function_idx,
        }
    }

    /// Mark `block_index` of the entry behind `slot` as entered.
    #[inline]
    pub fn record_slot(&mut self, slot: SlotId, block_index: usize) {
        self.files[slot.file].functions[slot.function]
            .1
            .mark(block_index);
    }

    /// Mark `block_index` of `function` in `file` as entered.
    ///
    /// Never fails and repeating a call changes nothing. Indices above
    /// [`MAX_BLOCK_INDEX`](crate::flags::MAX_BLOCK_INDEX) are ignored.
    pub fn record(&mut self, file: impl AsRef<Path>, function: &str, block_index: usize) {
        let slot = self.slot(file, function);
        self.record_slot(slot, block_index);
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&SourceFileCoverage> {
        self.by_path.get(path.as_ref()).map(|&idx| &self.files[idx])
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFileCoverage> {
        self.files.iter()
    }

    /// Merge this run's coverage into every affected store.
    ///
    /// Store I/O failures are logged and swallowed; see [`merge::finalize`].
    pub fn finalize(&self, config: &RuntimeConfig) -> FinalizeReport {
        merge::finalize(self, config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn record__first_use__then_creates_file_and_function() {
        let mut registry = CoverageRegistry::new();
        assert!(registry.is_empty());

        registry.record("/src/main.c", "main", 0);

        let file = registry.file("/src/main.c").expect("file entry");
        assert_eq!(file.path(), Path::new("/src/main.c"));
        assert_eq!(file.function("main").unwrap().as_slice(), &[true]);
    }

    #[test]
    fn record__index_beyond_len__then_grows_with_false_gap() {
        let mut registry = CoverageRegistry::new();
        registry.record("a.c", "foo", 0);
        registry.record("a.c", "foo", 2);

        let flags = registry.file("a.c").unwrap().function("foo").unwrap();
        assert_eq!(flags.as_slice(), &[true, false, true]);
    }

    #[test]
    fn record__any_call_order__then_same_result() {
        let mut forward = CoverageRegistry::new();
        let mut backward = CoverageRegistry::new();
        for idx in [0, 3, 1] {
            forward.record("a.c", "foo", idx);
        }
        for idx in [1, 3, 0, 3] {
            backward.record("a.c", "foo", idx);
        }

        assert_eq!(
            forward.file("a.c").unwrap().function("foo"),
            backward.file("a.c").unwrap().function("foo")
        );
    }

    #[test]
    fn slot__same_names__then_same_slot() {
        let mut registry = CoverageRegistry::new();
        let first = registry.slot("a.c", "foo");
        let again = registry.slot("a.c", "foo");
        let other_function = registry.slot("a.c", "bar");
        let other_file = registry.slot("b.c", "foo");

        assert_eq!(first, again);
        assert_ne!(first, other_function);
        assert_ne!(first, other_file);
        assert_eq!(registry.files().count(), 2);
    }

    #[test]
    fn record_slot__resolved_slot__then_marks_that_function_only() {
        let mut registry = CoverageRegistry::new();
        let foo = registry.slot("a.c", "foo");
        let _bar = registry.slot("a.c", "bar");

        registry.record_slot(foo, 1);

        let file = registry.file("a.c").unwrap();
        assert_eq!(file.function("foo").unwrap().as_slice(), &[false, true]);
        assert!(file.function("bar").unwrap().is_empty());
    }

    #[test]
    fn record__index_above_limit__then_function_created_without_flags() {
        let mut registry = CoverageRegistry::new();
        registry.record("a.c", "foo", 1);
        registry.record("a.c", "foo", usize::MAX);
        registry.record("a.c", "bar", usize::MAX);

        let file = registry.file("a.c").unwrap();
        assert_eq!(file.function("foo").unwrap().as_slice(), &[false, true]);
        assert!(file.function("bar").unwrap().is_empty());
    }

    #[test]
    fn functions__iteration__then_first_observation_order() {
        let mut registry = CoverageRegistry::new();
        registry.record("a.c", "zeta", 0);
        registry.record("a.c", "alpha", 0);

        let names: Vec<&str> = registry
            .file("a.c")
            .unwrap()
            .functions()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn to_store__recorded_functions__then_store_has_same_flags() {
        let mut registry = CoverageRegistry::new();
        registry.record("a.c", "foo", 1);
        registry.record("a.c", "bar", 0);

        let store = registry.file("a.c").unwrap().to_store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.function("foo").unwrap().as_slice(), &[false, true]);
        assert_eq!(store.function("bar").unwrap().as_slice(), &[true]);
    }
}
