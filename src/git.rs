use crate::config::Tools;
use crate::shell::{CommandOptions, Runner};
use std::path::Path;
use tracing::debug;

/// Short commit hash of `project_dir`, or `None` outside a git checkout.
pub async fn revision<R: Runner + ?Sized>(runner: &R, tools: &Tools, project_dir: &Path) -> Option<String> {
    let out = runner
        .run(
            &[tools.git.as_str(), "rev-parse", "--short", "HEAD"],
            CommandOptions::quiet().in_dir(project_dir),
        )
        .await;
    match out {
        Ok(res) => Some(res.stdout.trim().to_string()).filter(|rev| !rev.is_empty()),
        Err(e) => {
            debug!(dir = %project_dir.display(), error = %e, "no git revision");
            None
        }
    }
}
