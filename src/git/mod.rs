//! Git diff collection, staging and committing.

pub mod diff;
pub mod executor;

pub use diff::{ChangedFile, DiffSummary, FileStatus, describe_changes};
pub use executor::{GitCli, GitOps};
