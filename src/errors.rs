use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type returned by all API calls.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Returned when reading or copying an entry that has no backing file.
    /// Fill operations never return this: they create the file.
    #[error("No cached file found at {0:?}")]
    #[diagnostic(code(odscache::entry_not_found), url(docsrs))]
    EntryNotFound(PathBuf),

    /// Returned when a general IO error has occurred.
    #[error("{1}")]
    #[diagnostic(code(odscache::io_error), url(docsrs))]
    IoError(#[source] std::io::Error, String),

    /// Returned when a platform base URL could not be parsed.
    #[error("Invalid platform base URL {1:?}")]
    #[diagnostic(code(odscache::invalid_url), url(docsrs))]
    InvalidUrl(#[source] url::ParseError, String),

    /// Returned when content has to be decoded from an encoding label that
    /// does not name any known text encoding.
    #[error("Unknown text encoding label {0:?}")]
    #[diagnostic(
        code(odscache::unknown_encoding),
        url(docsrs),
        help("Use a WHATWG encoding label such as \"utf-8\" or \"windows-1252\".")
    )]
    UnknownEncoding(String),

    /// Returned when content is not valid in the encoding it was declared
    /// with.
    #[error("Content for {target} is not valid {encoding}")]
    #[diagnostic(code(odscache::decode_error), url(docsrs))]
    DecodeError {
        /// The encoding the content was declared with.
        encoding: String,
        /// Dataset id or file the content belongs to.
        target: String,
    },
}

impl Error {
    /// True for a cache miss, i.e. the entry has no backing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound(_))
    }
}

/// The result type returned by calls to this library
pub type Result<T> = std::result::Result<T, Error>;

pub trait IoErrorExt<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> IoErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(Error::IoError(e, f())),
        }
    }
}
