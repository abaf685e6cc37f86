use std::path::PathBuf;

use crate::resolver::ResolveError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grammar violation in a request file or config file.
    #[error("{}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },
    /// Placeholder substitution failed before any request was sent.
    #[error("{}: {source}", file.display())]
    Resolve {
        file: PathBuf,
        #[source]
        source: ResolveError,
    },
    /// The request could not be sent or its response could not be read.
    #[error("{}: {message}", file.display())]
    Transport { file: PathBuf, message: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Occurs when the config file location is invalid.
    #[error("failed to load config: {0}")]
    Load(String),
    /// Occurs when the specified option is not present in the config.
    #[error("the specified option \"{0}\" not found in config")]
    ValueNotFound(String),
    #[error("invalid value for option \"{key}\": {message}")]
    ValueError { key: String, message: String },
    /// Two assertion functions were registered under one name.
    #[error("assertion function \"{0}\" already registered")]
    DuplicateFunction(String),
    #[error("unknown reporter: {0}")]
    UnknownReporter(String),
}

impl Error {
    /// Path of the file the error belongs to, if any.
    pub fn file(&self) -> Option<&std::path::Path> {
        match self {
            Error::Parse { file, .. }
            | Error::Resolve { file, .. }
            | Error::Transport { file, .. } => Some(file),
            Error::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}
