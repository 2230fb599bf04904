//! Error management module.

use std::fmt;
use std::io;
use std::str::Utf8Error;

/// The error type used by this crate.
///
/// End of input is never an error: truncation inside a construct is reported
/// in-stream as a [`BadlyFormedEndOfStream`] token. Errors terminate the
/// token stream; tokens already emitted remain valid.
///
/// [`BadlyFormedEndOfStream`]: crate::tokens::TokenKind::BadlyFormedEndOfStream
#[derive(Debug)]
pub enum Error {
    /// An error raised by the upstream chunk source, propagated unchanged.
    Io(io::Error),

    /// Token text was requested as a string but the source bytes are not
    /// valid UTF-8.
    Utf8(Utf8Error),

    /// The input cannot be interpreted within the markup grammar and cannot
    /// be recovered by treating a stray character as content.
    Syntax(SyntaxError),

    /// The input used a construct the scanner deliberately does not handle,
    /// such as a markup declaration (`<!DOCTYPE …`).
    Unsupported(&'static str),

    /// A namespace declaration exceeded a hard size limit.
    LimitExceeded {
        /// What was being accumulated when the limit was hit.
        what: &'static str,
        /// The maximum number of code units allowed.
        limit: usize,
    },
}

/// Markup that does not fit the grammar at a point where no local recovery
/// exists. The payload is the offending code unit where one was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    /// Attributes must be separated from the tag name and from each other
    /// by whitespace.
    ExpectedWhitespace,

    /// Something other than an attribute name, `>` or `/>` followed the
    /// whitespace inside a tag.
    ExpectedAttributeName(u8),

    /// An attribute value must be enclosed in single or double quotes.
    UnquotedValue(u8),

    /// An end tag may only contain a name and trailing whitespace.
    ExpectedEndTagClose(u8),

    /// A processing-instruction target must be followed by whitespace
    /// or `?>`.
    ExpectedPiClose(u8),

    /// `/` inside a tag must be followed by `>`.
    ExpectedEmptyTagClose(u8),
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ExpectedWhitespace => {
                write!(f, "expected whitespace, `>` or `/>` between attributes")
            }
            Self::ExpectedAttributeName(b) => {
                write!(f, "expected attribute name, `>` or `/>`, found {}", unit(*b))
            }
            Self::UnquotedValue(b) => {
                write!(f, "attribute value must start with a quote, found {}", unit(*b))
            }
            Self::ExpectedEndTagClose(b) => {
                write!(f, "expected `>` to close the end tag, found {}", unit(*b))
            }
            Self::ExpectedPiClose(b) => write!(
                f,
                "expected `?>` after the processing instruction, found {}",
                unit(*b)
            ),
            Self::ExpectedEmptyTagClose(b) => {
                write!(f, "expected `>` after `/`, found {}", unit(*b))
            }
        }
    }
}

/// Renders a code unit for an error message.
fn unit(b: u8) -> String {
    if b.is_ascii_graphic() || b == b' ' {
        format!("`{}`", b as char)
    } else {
        format!("{:#04x}", b)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Utf8(e) => write!(f, "UTF-8 error: {}", e),
            Self::Syntax(e) => write!(f, "syntax error: {}", e),
            Self::Unsupported(what) => write!(f, "{} is not supported", what),
            Self::LimitExceeded { what, limit } => {
                write!(f, "{} exceeded the limit of {} code units", what, limit)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::Utf8(error)
    }
}

impl From<SyntaxError> for Error {
    #[inline]
    fn from(error: SyntaxError) -> Self {
        Self::Syntax(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
