//! Free-text diff analysis.

use tracing::debug;

use crate::commit::prompt::build_analysis_prompt;
use crate::error::BackendError;
use crate::llm::CompletionBackend;

/// Ask the model to summarise `diff`.
///
/// One completion call. The text comes back trimmed but otherwise as the
/// model wrote it; nothing downstream parses it.
pub async fn analyze_diff(
    diff: &str,
    backend: &dyn CompletionBackend,
) -> Result<String, BackendError> {
    let prompt = build_analysis_prompt(diff);
    debug!("Analysis prompt length: {} chars", prompt.len());

    let analysis = backend.complete(&prompt).await?;
    Ok(analysis.trim().to_string())
}
