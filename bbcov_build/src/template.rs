//! All-false store skeletons written at build time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bbcov_runtime::store::TEMPLATE_BLOCK_MARKER;
use bbcov_runtime::{store_path, BlockFlags, CoverageStore};
use tracing::{debug, info};

use crate::error::BuildResult;
use crate::layout::BuildLayout;

/// Skeleton for one source file: every function present, every block unset.
pub fn template_store(functions: &BTreeMap<String, usize>) -> CoverageStore {
    let mut store = CoverageStore::new();
    for (name, &capacity) in functions {
        store.insert_function(name.clone(), BlockFlags::with_len(capacity));
    }
    store
}

/// Verify `layout`, then overwrite the store of every file it lists.
///
/// A layout that fails verification writes nothing. Write failures stop
/// emission and are returned; stores written before the failure stay.
pub fn emit_templates(layout: &BuildLayout) -> BuildResult<Vec<PathBuf>> {
    layout.verify()?;

    let mut written = Vec::with_capacity(layout.files.len());
    for (file, functions) in &layout.files {
        let path = store_path(file);
        template_store(functions).write(&path, TEMPLATE_BLOCK_MARKER)?;
        debug!(store = %path.display(), functions = functions.len(), "Template written");
        written.push(path);
    }

    info!(
        files = written.len(),
        functions = layout.function_count(),
        "Coverage templates emitted"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::error::{BuildError, BuildIntegrityError};
    use std::fs;
    use tempfile::tempdir;

    fn layout_for(entries: &[(&str, &str, usize)]) -> BuildLayout {
        let mut layout = BuildLayout::new();
        for (file, function, capacity) in entries {
            layout
                .files
                .entry(file.to_string())
                .or_default()
                .insert(function.to_string(), *capacity);
        }
        layout
    }

    #[test]
    fn template_store__capacities__then_all_false_blocks() {
        let mut functions = BTreeMap::new();
        functions.insert("main".to_string(), 3);
        functions.insert("empty".to_string(), 0);

        let store = template_store(&functions);

        assert_eq!(store.function("main").unwrap().as_slice(), &[false, false, false]);
        assert!(store.function("empty").unwrap().is_empty());
        assert_eq!(store.covered_blocks(), 0);
    }

    #[test]
    fn emit_templates__valid_layout__then_fresh_templates_written() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("main.c").display().to_string();
        let layout = layout_for(&[(&source, "main", 2), (&source, "helper(int)", 1)]);

        let written = emit_templates(&layout).expect("emit");

        assert_eq!(written, vec![store_path(&source)]);
        assert_eq!(
            fs::read_to_string(store_path(&source)).unwrap(),
            "F helper(int) 0\nb 0 0\nF main 0\nb 0 0\nb 1 0\n"
        );
    }

    #[test]
    fn emit_templates__existing_store__then_fully_replaced() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("main.c").display().to_string();
        fs::write(store_path(&source), "F old 1\nB 0 1\nB 1 1\n").unwrap();

        emit_templates(&layout_for(&[(&source, "main", 1)])).expect("emit");

        assert_eq!(fs::read_to_string(store_path(&source)).unwrap(), "F main 0\nb 0 0\n");
    }

    #[test]
    fn emit_templates__integrity_failure__then_nothing_written() {
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("a.c").display().to_string();
        let layout = layout_for(&[(&good, "main", 1), (&good, "bad\nname", 1)]);

        let err = emit_templates(&layout).unwrap_err();

        assert!(matches!(
            err,
            BuildError::Integrity(BuildIntegrityError::FunctionNameLineBreak { .. })
        ));
        assert!(!store_path(&good).exists());
    }

    #[test]
    fn emit_templates__unwritable_location__then_io_error() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("missing").join("a.c").display().to_string();

        let err = emit_templates(&layout_for(&[(&source, "main", 1)])).unwrap_err();

        assert!(matches!(err, BuildError::Io { .. }));
    }
}
