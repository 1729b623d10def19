use std::path::Path;

use crate::error::{PipelineError, Result};

/// Delete files a stage has consumed.
///
/// Called only after the consuming stage succeeded. Stops at the first
/// failure; files before it are already gone, files after it remain.
pub async fn consume_inputs<'a, I>(paths: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut removed = 0;
    for path in paths {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        tracing::debug!(path = %path.display(), "removed consumed file");
        removed += 1;
    }
    Ok(removed)
}
