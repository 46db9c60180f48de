//! Error taxonomy for the transform stage.
//!
//! Configuration failures and transpile failures are fatal to the build and
//! propagate to the host. Unreadable source files during selection are not
//! errors: they are logged and the file is deferred to the host.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem reported while reading or composing a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDiagnostic {
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl ConfigDiagnostic {
    pub fn new(file: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file,
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn at(file: PathBuf, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            file: Some(file),
            line: Some(line),
            column: Some(column),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let (Some(line), Some(column)) = (self.line, self.column) {
                write!(f, ":{}:{}", line, column)?;
            }
            write!(f, " - ")?;
        }
        write!(f, "error: {}", self.message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// An explicitly requested configuration does not exist at or above the working directory.
    #[error("failed to find configuration '{}' from '{}'", .path.display(), .cwd.display())]
    ConfigNotFound { path: PathBuf, cwd: PathBuf },

    #[error("failed to read '{}': {source}", .path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse '{}'", .path.display())]
    ConfigParse {
        path: PathBuf,
        diagnostics: Vec<ConfigDiagnostic>,
    },

    #[error("failed to transpile '{file}': {}", .diagnostics.join("; "))]
    Transpile {
        file: String,
        diagnostics: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
