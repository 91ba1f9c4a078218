//! Per-file, per-function block capacities collected while instrumenting.
//!
//! Serialized as JSON for the CLI:
//!
//! ```json
//! { "files": { "/src/app/main.c": { "main": 4, "helper(int)": 2 } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::contract::{assign_block_indices_from, BlockAssignment, BlockShape};
use crate::error::{BuildError, BuildIntegrityError, BuildResult};

/// Function name to block capacity.
pub type FunctionCapacities = BTreeMap<String, usize>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLayout {
    #[serde(default)]
    pub files: BTreeMap<String, FunctionCapacities>,
}

impl BuildLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn function_count(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }

    pub fn capacity(&self, file: &str, function: &str) -> Option<usize> {
        self.files.get(file)?.get(function).copied()
    }

    /// Number the blocks of `function` and record its capacity.
    ///
    /// A second function with the same display name in the same file
    /// continues the existing numbering, so the two never share an index.
    pub fn register_function(
        &mut self,
        file: &str,
        function: &str,
        blocks: &[BlockShape],
    ) -> BlockAssignment {
        let capacity = self
            .files
            .entry(file.to_string())
            .or_default()
            .entry(function.to_string())
            .or_insert(0);
        let assignment = assign_block_indices_from(*capacity, blocks);
        *capacity = assignment.capacity();
        assignment
    }

    /// Reject layouts whose names cannot be written to or read back from a
    /// store. Files are checked in path order, functions in name order.
    pub fn verify(&self) -> Result<(), BuildIntegrityError> {
        for (file, functions) in &self.files {
            verify_file_path(file)?;
            for function in functions.keys() {
                if function.is_empty() {
                    return Err(BuildIntegrityError::EmptyFunctionName { file: file.clone() });
                }
                if has_line_break(function) {
                    return Err(BuildIntegrityError::FunctionNameLineBreak {
                        file: file.clone(),
                        function: function.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> BuildResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> BuildResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| BuildError::io(path, err))?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> BuildResult<()> {
        fs::write(path, self.to_json()?).map_err(|err| BuildError::io(path, err))
    }
}

fn verify_file_path(file: &str) -> Result<(), BuildIntegrityError> {
    if file.is_empty() {
        return Err(BuildIntegrityError::EmptyFilePath);
    }
    if has_line_break(file) {
        return Err(BuildIntegrityError::FilePathLineBreak {
            file: file.to_string(),
        });
    }
    if file.ends_with('/') {
        return Err(BuildIntegrityError::FilePathIsDirectory {
            file: file.to_string(),
        });
    }
    Ok(())
}

fn has_line_break(value: &str) -> bool {
    value.contains(|c: char| c == '\n' || c == '\r')
}
