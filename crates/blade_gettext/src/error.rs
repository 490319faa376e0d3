use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GettextError>;

/// Exit code used for operator input errors (bad configuration, no sources).
pub const CONFIG_EXIT_CODE: i32 = 2;

#[derive(Debug, Error)]
pub enum GettextError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to {action} {path}: {source}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("failed to parse configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error(
        "no source files found in {} (add views or configure additional directories)",
        display_paths(.searched)
    )]
    NoSourcesFound { searched: Vec<PathBuf> },

    #[error("failed to compile template {source_path}: {message}")]
    Compilation { source_path: PathBuf, message: String },

    #[error(
        "xgettext exited with {exit_code} ({exit_text})\n{command_line}{}",
        stderr_suffix(.stderr)
    )]
    ExtractionFailed {
        exit_code: i32,
        exit_text: String,
        command_line: String,
        stderr: String,
    },

    #[error(
        "msgmerge exited with {exit_code} ({exit_text}) for locale {locale}\n{command_line}{}",
        stderr_suffix(.stderr)
    )]
    MergeFailed {
        locale: String,
        exit_code: i32,
        exit_text: String,
        command_line: String,
        stderr: String,
    },

    #[error("missing dependency command: {command}")]
    MissingCommand { command: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

impl GettextError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::ConfigParse { .. } | Self::NoSourcesFound { .. } => {
                CONFIG_EXIT_CODE
            }
            Self::ExtractionFailed { exit_code, .. } | Self::MergeFailed { exit_code, .. }
                if *exit_code != 0 =>
            {
                *exit_code
            }
            _ => 1,
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Builds a `map_err` adapter tagging an I/O failure with the action and path.
    pub fn filesystem(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Filesystem {
            action,
            path,
            source,
        }
    }
}
