//! The namespace lift: a filter that hoists `xmlns` bindings above the
//! tag that declares them.
//!
//! A consumer resolving namespaces wants the bindings of a tag *before*
//! the tag's own tokens, but the declarations sit somewhere inside the
//! attribute list. [`NamespaceScanner`] therefore caches every token of a
//! start or empty tag, extracts `xmlns` / `xmlns:prefix` attributes on the
//! way, and then replays synthesised [`NamespaceDefault`] /
//! [`NamespacePrefix`] / [`NamespaceUri`] events followed by the cached
//! tokens, unchanged and in order. Stripping the namespace events from the
//! filtered stream yields exactly the underlying lexer's stream; the
//! events themselves carry empty literals, so literal concatenation still
//! reproduces the input.
//!
//! [`NamespaceDefault`]: TokenKind::NamespaceDefault
//! [`NamespacePrefix`]: TokenKind::NamespacePrefix
//! [`NamespaceUri`]: TokenKind::NamespaceUri

use std::collections::VecDeque;
use std::io::Read;

use crate::buffer::{BufChunks, Chunks};
use crate::errors::{Error, Result};
use crate::lex::TokenScanner;
use crate::tokens::{Text, TokenKind, TokenSource};

/// Hard cap on the accumulated length of an attribute name.
pub const XMLNS_NAME_LIMIT: usize = 512;
/// Hard cap on the accumulated length of a namespace URI.
pub const XMLNS_URI_LIMIT: usize = 2048;

/// An owned copy of one token piece, parked until its tag is complete.
#[derive(Debug)]
struct Queued {
    kind: TokenKind,
    literal: Vec<u8>,
    content: Option<Vec<u8>>,
    is_initial: bool,
    is_final: bool,
}

impl Queued {
    fn copied(kind: TokenKind, text: &Text) -> Self {
        Self {
            kind,
            literal: text.literal().to_vec(),
            content: None,
            is_initial: text.is_initial(),
            is_final: text.is_final(),
        }
    }

    fn synthesized(kind: TokenKind, content: &[u8]) -> Self {
        Self {
            kind,
            literal: Vec::new(),
            content: Some(content.to_vec()),
            is_initial: true,
            is_final: true,
        }
    }
}

#[derive(Debug)]
enum Current {
    None,
    /// The current token lives in the wrapped source.
    Inner,
    /// The current token was replayed from the tag cache.
    Queued(Queued),
}

/// Which namespace event an attribute name declares, if any.
enum Binding<'a> {
    Default,
    Prefix(&'a [u8]),
}

fn xmlns_binding(name: &[u8]) -> Option<Binding<'_>> {
    if name == b"xmlns" {
        Some(Binding::Default)
    } else {
        // Names that merely start with `xmlns` (no colon) bind nothing.
        name.strip_prefix(b"xmlns:").map(Binding::Prefix)
    }
}

/// A filter over any [`TokenSource`] that emits namespace-binding events
/// before the start or empty tag declaring them.
#[derive(Debug)]
pub struct NamespaceScanner<S> {
    source: S,
    queue: VecDeque<Queued>,
    current: Current,
}

impl<S: TokenSource> NamespaceScanner<S> {
    /// Wraps a token source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            queue: VecDeque::new(),
            current: Current::None,
        }
    }

    /// Advertises the kind of the next token, or `None` at the end of the
    /// stream. See [`TokenSource::read_token`].
    pub fn read_token(&mut self) -> Result<Option<TokenKind>> {
        if let Some(queued) = self.queue.pop_front() {
            let kind = queued.kind;
            self.current = Current::Queued(queued);
            return Ok(Some(kind));
        }
        match self.source.read_token()? {
            Some(TokenKind::StartOrEmptyTagOpen) => {
                self.cache_tag()?;
                match self.queue.pop_front() {
                    Some(queued) => {
                        let kind = queued.kind;
                        self.current = Current::Queued(queued);
                        Ok(Some(kind))
                    }
                    // The cache always holds at least the open token.
                    None => Ok(None),
                }
            }
            Some(kind) => {
                self.current = Current::Inner;
                Ok(Some(kind))
            }
            None => {
                self.current = Current::None;
                Ok(None)
            }
        }
    }

    /// Materialises the text of the most recently advertised token.
    pub fn text(&self) -> Text<'_> {
        match &self.current {
            Current::Inner => self.source.text(),
            Current::Queued(q) => {
                Text::parts(&q.literal, q.content.as_deref(), q.is_initial, q.is_final)
            }
            Current::None => Text::parts(b"", None, true, true),
        }
    }

    /// Reads and caches a whole tag, the open token of which was just
    /// advertised by the source, then loads the queue with the discovered
    /// namespace events followed by the cached tokens.
    fn cache_tag(&mut self) -> Result<()> {
        let mut cached = Vec::new();
        let mut events = Vec::new();
        cached.push(Queued::copied(
            TokenKind::StartOrEmptyTagOpen,
            &self.source.text(),
        ));
        let mut token = self.source.read_token()?;
        loop {
            match token {
                None => break,
                Some(
                    kind @ (TokenKind::StartTagClose
                    | TokenKind::EmptyTagClose
                    | TokenKind::BadlyFormedEndOfStream),
                ) => {
                    cached.push(Queued::copied(kind, &self.source.text()));
                    break;
                }
                Some(TokenKind::AttributeName) => {
                    let mut name = Vec::new();
                    loop {
                        let last = {
                            let text = self.source.text();
                            name.extend_from_slice(text.content());
                            cached.push(Queued::copied(TokenKind::AttributeName, &text));
                            text.is_final()
                        };
                        if name.len() > XMLNS_NAME_LIMIT {
                            return Err(Error::LimitExceeded {
                                what: "attribute name",
                                limit: XMLNS_NAME_LIMIT,
                            });
                        }
                        token = self.source.read_token()?;
                        if last {
                            break;
                        }
                    }
                    if let Some(binding) = xmlns_binding(&name) {
                        if let Some(uri) = self.cache_value(&mut cached, &mut token)? {
                            match binding {
                                Binding::Default => events
                                    .push(Queued::synthesized(TokenKind::NamespaceDefault, b"")),
                                Binding::Prefix(prefix) => events
                                    .push(Queued::synthesized(TokenKind::NamespacePrefix, prefix)),
                            }
                            events.push(Queued::synthesized(TokenKind::NamespaceUri, &uri));
                        }
                    }
                }
                Some(kind) => {
                    cached.push(Queued::copied(kind, &self.source.text()));
                    token = self.source.read_token()?;
                }
            }
        }
        self.queue.extend(events);
        self.queue.extend(cached);
        Ok(())
    }

    /// Caches the `= "uri"` part of an `xmlns` attribute. Returns the
    /// accumulated URI, or `None` if the tag was cut short (or the
    /// attribute had no value) before the binding completed — in that
    /// case `token` is left on the interrupting token for the tag loop.
    fn cache_value(
        &mut self,
        cached: &mut Vec<Queued>,
        token: &mut Option<TokenKind>,
    ) -> Result<Option<Vec<u8>>> {
        while *token == Some(TokenKind::MarkupWhitespace) {
            cached.push(Queued::copied(
                TokenKind::MarkupWhitespace,
                &self.source.text(),
            ));
            *token = self.source.read_token()?;
        }
        if *token != Some(TokenKind::AttributeEquals) {
            return Ok(None);
        }
        cached.push(Queued::copied(
            TokenKind::AttributeEquals,
            &self.source.text(),
        ));
        *token = self.source.read_token()?;
        while *token == Some(TokenKind::MarkupWhitespace) {
            cached.push(Queued::copied(
                TokenKind::MarkupWhitespace,
                &self.source.text(),
            ));
            *token = self.source.read_token()?;
        }
        match *token {
            Some(
                kind @ (TokenKind::AttributeValueDoubleOpen | TokenKind::AttributeValueSingleOpen),
            ) => {
                cached.push(Queued::copied(kind, &self.source.text()));
                *token = self.source.read_token()?;
            }
            _ => return Ok(None),
        }
        let mut uri = Vec::new();
        while *token == Some(TokenKind::AttributeValue) {
            cached.push({
                let text = self.source.text();
                uri.extend_from_slice(text.content());
                Queued::copied(TokenKind::AttributeValue, &text)
            });
            if uri.len() > XMLNS_URI_LIMIT {
                return Err(Error::LimitExceeded {
                    what: "namespace URI",
                    limit: XMLNS_URI_LIMIT,
                });
            }
            *token = self.source.read_token()?;
        }
        match *token {
            Some(
                kind
                @ (TokenKind::AttributeValueDoubleClose | TokenKind::AttributeValueSingleClose),
            ) => {
                cached.push(Queued::copied(kind, &self.source.text()));
                *token = self.source.read_token()?;
                Ok(Some(uri))
            }
            _ => Ok(None),
        }
    }
}

impl<I> NamespaceScanner<TokenScanner<Chunks<I>>>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    /// Builds the whole pipeline over an iterator of plain chunks.
    pub fn from_chunks<T>(chunks: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self::new(TokenScanner::from_chunks(chunks))
    }
}

impl<R: Read> NamespaceScanner<TokenScanner<BufChunks<R>>> {
    /// Builds the whole pipeline reading chunks from `reader`.
    pub fn from_reader(reader: R) -> Self {
        Self::new(TokenScanner::from_reader(reader))
    }
}

impl<S: TokenSource> TokenSource for NamespaceScanner<S> {
    fn read_token(&mut self) -> Result<Option<TokenKind>> {
        NamespaceScanner::read_token(self)
    }

    fn text(&self) -> Text<'_> {
        NamespaceScanner::text(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn xmlns_names() {
        assert!(matches!(xmlns_binding(b"xmlns"), Some(Binding::Default)));
        assert!(matches!(
            xmlns_binding(b"xmlns:ns"),
            Some(Binding::Prefix(b"ns"))
        ));
        assert!(xmlns_binding(b"xmlnsish").is_none());
        assert!(xmlns_binding(b"foo").is_none());
    }

    #[test]
    fn non_tag_tokens_pass_through() {
        let mut sc = NamespaceScanner::from_chunks(["plain text"]);
        assert_eq!(sc.read_token().unwrap(), Some(TokenKind::PcData));
        assert_eq!(sc.text().literal(), b"plain text");
    }

    #[test]
    fn uri_limit_is_enforced() {
        let huge = "x".repeat(XMLNS_URI_LIMIT + 1);
        let doc = format!("<tag xmlns:ns=\"{}\">", huge);
        let mut sc = NamespaceScanner::from_chunks([doc]);
        let err = loop {
            match sc.read_token() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected the URI limit to trip"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::LimitExceeded { limit, .. } if limit == XMLNS_URI_LIMIT));
    }

    #[test]
    fn name_limit_is_enforced() {
        let huge = "x".repeat(XMLNS_NAME_LIMIT + 1);
        let doc = format!("<tag {}=\"v\">", huge);
        let mut sc = NamespaceScanner::from_chunks([doc]);
        let err = loop {
            match sc.read_token() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected the name limit to trip"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::LimitExceeded { limit, .. } if limit == XMLNS_NAME_LIMIT));
    }
}
