//! Commit message generation pipeline: analysis, splitting, message
//! generation and the orchestrating workflow.

pub mod analysis;
pub mod message;
pub mod prompt;
pub mod split;
pub mod workflow;

pub use analysis::analyze_diff;
pub use message::{
    GeneratedMessage, MessageSource, clean_commit_message, extract_changed_files,
    fix_commit_format, generate_commit_message, generate_fallback_message, get_file_type_prefix,
    is_conventional_commit_format,
};
pub use split::{
    LogicalChangeUnit, SplitOutcome, UnitFingerprint, create_fallback_units, dedup_units,
    parse_logical_units, retain_known_files, similar_explanations, split_changes,
    split_changes_with_analysis,
};
pub use workflow::{CommitWorkflow, ProcessedUnits, RunSummary, WorkflowOptions};
