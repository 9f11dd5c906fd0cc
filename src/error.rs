use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MobyError>;

#[derive(Error, Debug)]
pub enum MobyError {
    #[error("configuration file {path} not found")]
    ConfigNotFound { path: PathBuf },

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project {name} not found in .moby.yaml")]
    ProjectNotFound { name: String },

    #[error("no project selected; resolve a project first")]
    NoProjectSelected,

    #[error("project name is required for 'dev {action}'")]
    ProjectRequired { action: String },

    #[error("project {name} has no ports configured; pass --port")]
    NoPort { name: String },

    #[error("container {name} already exists. Use 'restart' or 'rebuild' instead.")]
    ContainerExists { name: String },

    #[error("no version specified and couldn't get git hash. Use --version to specify version.")]
    MissingVersion,

    /// Non-zero exit. Output is kept for diagnostics.
    #[error("command `{command}` failed with code {code}: {}", .stderr.trim_end())]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty command")]
    EmptyCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_display_includes_trimmed_stderr() {
        let err = MobyError::CommandFailed {
            command: "docker push api:latest".to_string(),
            code: 1,
            stdout: String::new(),
            stderr: "denied: not authorized\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command `docker push api:latest` failed with code 1: denied: not authorized"
        );
    }

    #[test]
    fn config_not_found_names_the_path() {
        let err = MobyError::ConfigNotFound {
            path: PathBuf::from("/opt/moby/.moby.yaml"),
        };
        assert_eq!(
            err.to_string(),
            "configuration file /opt/moby/.moby.yaml not found"
        );
    }
}
