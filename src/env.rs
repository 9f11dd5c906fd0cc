use crate::error::{MobyError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

pub const ECR_ENV_FILE: &str = ".env.ecr";

/// Parse `KEY=VALUE` lines.
/// Ignores empty lines and comments (#). Lines without a key or a value are skipped.
pub fn parse_env(raw: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in raw.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty() && !value.is_empty() {
                vars.insert(key.to_string(), value.to_string());
            }
        }
    }
    vars
}

/// Read `.env.ecr` from a project directory. A missing file is not an error.
pub fn load_ecr_config(project_dir: &Path) -> Result<BTreeMap<String, String>> {
    let path = project_dir.join(ECR_ENV_FILE);
    match fs::read_to_string(&path) {
        Ok(raw) => Ok(parse_env(&raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "No .env.ecr found");
            Ok(BTreeMap::new())
        }
        Err(source) => Err(MobyError::Io { path, source }),
    }
}
