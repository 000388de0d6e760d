use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open {path}: {message}")]
    Open { path: String, message: String },

    #[error("{path}: sheet {sheet}: {message}")]
    Sheet {
        path: String,
        sheet: String,
        message: String,
    },

    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unsupported file type (expected {expected})")]
    Unsupported { path: String, expected: &'static str },
}

impl IoError {
    pub(crate) fn open(path: &Path, message: impl ToString) -> Self {
        Self::Open {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.display().to_string(),
            source,
        }
    }
}
