//! Build-time half of bbcov.
//!
//! An instrumentor uses [`contract`] to decide what to instrument and how to
//! number blocks, collects the result in a [`BuildLayout`], and hands it to
//! [`emit_templates`], which writes one all-false store per source file.

pub mod contract;
pub mod error;
pub mod layout;
pub mod template;

pub use contract::{
    assign_block_indices, file_path, is_entry_function, is_termination_call, BlockAssignment,
    BlockIndex, BlockShape, DebugLocation, EligibilityPolicy, FunctionInfo,
};
pub use error::{BuildError, BuildIntegrityError, BuildResult};
pub use layout::BuildLayout;
pub use template::{emit_templates, template_store};
