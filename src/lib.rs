//! Streaming lexical scanner for XML-like markup.
//!
//! ## Description
//!
//! - `TokenScanner`: a low level pull lexer that turns a lazy sequence of
//!   character chunks into a stream of typed lexical tokens — tags,
//!   attributes, processing instructions, comments, CDATA sections and
//!   character data — without ever materialising the whole input.
//! - `NamespaceScanner`: a filter over the token stream that recognises
//!   `xmlns` / `xmlns:prefix` attributes and emits namespace-binding
//!   events *before* the tag that declares them, leaving the underlying
//!   token sequence untouched.
//!
//! Tokens are pulled in two phases. `read_token` advertises the next
//! token's kind, which is a plain `Copy` discriminator; only when the
//! caller asks for `text` is the token's text materialised, as a borrow
//! into the scanner's chunk window. Consumers that filter on kinds — a
//! tag counter, say — never pay for text they discard.
//!
//! The scanner is tolerant of ill-formed input: a stray `<` or `&`
//! becomes a `BadlyFormed*` content token and scanning continues, and a
//! stream truncated inside a construct is closed with a
//! `BadlyFormedEndOfStream` token rather than an error. It is a lexer,
//! not a validating parser: entities are not decoded, tag nesting is not
//! enforced, and DTDs are not supported.
//!
//! ## Examples
//!
//! Counting start tags, with text left unmaterialised:
//!
//! ```rust
//! use xmlscan::{TokenKind, TokenScanner};
//!
//! let chunks = ["<doc><item a=\"1\"/><it", "em a=\"2\"/></doc>"];
//! let mut scanner = TokenScanner::from_chunks(chunks);
//!
//! let mut count = 0;
//! while let Some(kind) = scanner.read_token().unwrap() {
//!     if kind == TokenKind::StartOrEmptyTagOpen {
//!         count += 1;
//!     }
//! }
//! assert_eq!(count, 3);
//! ```
//!
//! Collecting document text; the chunk boundaries are invisible:
//!
//! ```rust
//! use xmlscan::TokenScanner;
//!
//! let chunks = ["<greeting>Hello, ", "World!</greeting>"];
//! let mut scanner = TokenScanner::from_chunks(chunks);
//!
//! let mut text = Vec::new();
//! while let Some(kind) = scanner.read_token().unwrap() {
//!     if kind.is_content() {
//!         text.extend_from_slice(scanner.text().content());
//!     }
//! }
//! assert_eq!(text, b"Hello, World!");
//! ```
//!
//! Namespace declarations are announced before their tag:
//!
//! ```rust
//! use xmlscan::{NamespaceScanner, TokenKind};
//!
//! let mut scanner = NamespaceScanner::from_chunks(["<ns:t xmlns:ns=\"u\"/>"]);
//!
//! assert_eq!(scanner.read_token().unwrap(), Some(TokenKind::NamespacePrefix));
//! assert_eq!(scanner.text().content(), b"ns");
//! assert_eq!(scanner.read_token().unwrap(), Some(TokenKind::NamespaceUri));
//! assert_eq!(scanner.text().content(), b"u");
//! // the tag itself follows, unchanged
//! assert_eq!(
//!     scanner.read_token().unwrap(),
//!     Some(TokenKind::StartOrEmptyTagOpen)
//! );
//! ```
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod buffer;
pub mod errors;
pub mod lex;
pub mod namespace;
pub mod tokens;

mod parser;
mod utils;

pub use crate::buffer::{BufChunks, ChunkBuffer, Matched};
pub use crate::errors::{Error, Result, SyntaxError};
pub use crate::lex::TokenScanner;
pub use crate::namespace::NamespaceScanner;
pub use crate::tokens::{Text, TokenKind, TokenSource};
