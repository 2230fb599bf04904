//! The closed set of lexical token kinds and their text payloads.
//!
//! Tokens are delivered in two phases so that callers pay nothing for
//! tokens they discard. [`TokenSource::read_token`] advertises the kind of
//! the next token; [`TokenSource::text`] materialises its text as a borrow
//! into the scanner. The borrow ends at the next scanner call, which is
//! exactly the window in which the underlying buffer may be compacted —
//! callers that keep text longer copy it into their own storage.

#[cfg(feature = "encoding")]
use std::borrow::Cow;
use std::fmt;
use std::str::from_utf8;

#[cfg(feature = "encoding")]
use encoding_rs::Encoding;

use crate::errors::Result;
use crate::utils::write_byte_string;

/// The kind of one lexical token.
///
/// Kinds are plain discriminators: cheap to copy and compare, with no text
/// attached. Kinds whose text is fixed expose it via [`fixed_literal`];
/// for everything else the text comes from [`TokenSource::text`].
///
/// [`fixed_literal`]: Self::fixed_literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Parsed character data between markup.
    PcData,
    /// Character data inside a `<![CDATA[ … ]]>` section.
    CData,
    /// Whitespace directly after a markup construct, before any other
    /// content. Split out so consumers can skip inter-markup gaps without
    /// scanning content.
    WhitespaceContent,
    /// A `<` that did not scan as markup, recovered as content.
    BadlyFormedLessThan,
    /// A raw `&` in content, recovered as content.
    BadlyFormedAmpersand,

    /// The name of a start, empty or end tag.
    TagName,
    /// An attribute name.
    AttributeName,
    /// The target name of a processing instruction.
    ProcessingInstructionTarget,

    /// An attribute value between its quotes.
    AttributeValue,
    /// Everything between a processing-instruction target and `?>`.
    ProcessingInstructionData,
    /// Everything between `<!--` and `-->`.
    CommentData,

    /// `<` opening a start or empty tag.
    StartOrEmptyTagOpen,
    /// `</`.
    EndTagOpen,
    /// `=` between an attribute name and its value.
    AttributeEquals,
    /// `"` opening an attribute value.
    AttributeValueDoubleOpen,
    /// `'` opening an attribute value.
    AttributeValueSingleOpen,
    /// `"` closing an attribute value.
    AttributeValueDoubleClose,
    /// `'` closing an attribute value.
    AttributeValueSingleClose,
    /// `>` closing a start tag.
    StartTagClose,
    /// `/>` closing an empty tag.
    EmptyTagClose,
    /// `>` closing an end tag.
    EndTagClose,
    /// `<?`.
    ProcessingInstructionOpen,
    /// `?>`.
    ProcessingInstructionClose,
    /// `<!--`.
    CommentOpen,
    /// `-->`.
    CommentClose,
    /// `<![CDATA[`.
    CDataOpen,
    /// `]]>`.
    CDataClose,
    /// Whitespace inside markup, for example between attributes.
    MarkupWhitespace,

    /// The stream ended inside a construct. Carries whatever trailing
    /// partial literal was consumed; the stream ends after this token.
    BadlyFormedEndOfStream,

    /// A default namespace declaration (`xmlns="…"`), hoisted before the
    /// tag that declares it. Empty literal; empty content.
    NamespaceDefault,
    /// A prefixed namespace declaration (`xmlns:p="…"`), hoisted before
    /// the tag that declares it. Empty literal; the prefix as content.
    NamespacePrefix,
    /// The URI of the preceding namespace declaration. Empty literal; the
    /// URI as content.
    NamespaceUri,
}

impl TokenKind {
    /// The text of this kind when it is the same in every document, for
    /// example `<!--` for [`CommentOpen`](Self::CommentOpen).
    pub const fn fixed_literal(self) -> Option<&'static [u8]> {
        match self {
            Self::StartOrEmptyTagOpen => Some(b"<"),
            Self::EndTagOpen => Some(b"</"),
            Self::AttributeEquals => Some(b"="),
            Self::AttributeValueDoubleOpen | Self::AttributeValueDoubleClose => Some(b"\""),
            Self::AttributeValueSingleOpen | Self::AttributeValueSingleClose => Some(b"'"),
            Self::StartTagClose | Self::EndTagClose => Some(b">"),
            Self::EmptyTagClose => Some(b"/>"),
            Self::ProcessingInstructionOpen => Some(b"<?"),
            Self::ProcessingInstructionClose => Some(b"?>"),
            Self::CommentOpen => Some(b"<!--"),
            Self::CommentClose => Some(b"-->"),
            Self::CDataOpen => Some(b"<![CDATA["),
            Self::CDataClose => Some(b"]]>"),
            Self::BadlyFormedLessThan => Some(b"<"),
            Self::BadlyFormedAmpersand => Some(b"&"),
            _ => None,
        }
    }

    /// `false` for the recovery tokens inserted for malformed input.
    pub const fn is_well_formed(self) -> bool {
        !matches!(
            self,
            Self::BadlyFormedLessThan | Self::BadlyFormedAmpersand | Self::BadlyFormedEndOfStream
        )
    }

    /// Content that appears outside markup. The concatenated content of
    /// these tokens is the document text.
    pub const fn is_content(self) -> bool {
        matches!(
            self,
            Self::PcData
                | Self::CData
                | Self::WhitespaceContent
                | Self::BadlyFormedLessThan
                | Self::BadlyFormedAmpersand
        )
    }

    /// Anything that is not content and not a synthesised namespace event.
    pub const fn is_markup(self) -> bool {
        !self.is_content() && !self.is_namespace()
    }

    /// Structural markup: the fixed delimiters and markup whitespace.
    pub const fn is_structure(self) -> bool {
        self.is_markup()
            && !self.is_name()
            && !self.is_data()
            && !matches!(self, Self::BadlyFormedEndOfStream)
    }

    /// Name-like markup.
    pub const fn is_name(self) -> bool {
        matches!(
            self,
            Self::TagName | Self::AttributeName | Self::ProcessingInstructionTarget
        )
    }

    /// Data-like markup.
    pub const fn is_data(self) -> bool {
        matches!(
            self,
            Self::AttributeValue | Self::ProcessingInstructionData | Self::CommentData
        )
    }

    /// Namespace events synthesised by the namespace layer.
    pub const fn is_namespace(self) -> bool {
        matches!(
            self,
            Self::NamespaceDefault | Self::NamespacePrefix | Self::NamespaceUri
        )
    }
}

/// The materialised text of one token piece.
///
/// A logical token whose text straddles a window reload arrives as several
/// pieces: the first with [`is_initial`], the last with [`is_final`], both
/// set when the token is a single piece. The borrow is only valid until
/// the next scanner call.
///
/// [`is_initial`]: Self::is_initial
/// [`is_final`]: Self::is_final
#[derive(Clone, Copy)]
pub struct Text<'a> {
    literal: &'a [u8],
    content: Option<&'a [u8]>,
    is_initial: bool,
    is_final: bool,
}

impl<'a> Text<'a> {
    pub(crate) fn new(literal: &'a [u8], is_initial: bool, is_final: bool) -> Self {
        Self {
            literal,
            content: None,
            is_initial,
            is_final,
        }
    }

    pub(crate) fn parts(
        literal: &'a [u8],
        content: Option<&'a [u8]>,
        is_initial: bool,
        is_final: bool,
    ) -> Self {
        Self {
            literal,
            content,
            is_initial,
            is_final,
        }
    }

    /// The exact source units of this piece. Synthesised namespace events
    /// have an empty literal, so concatenating the literals of a filtered
    /// stream still reproduces the input.
    #[inline]
    pub fn literal(&self) -> &'a [u8] {
        self.literal
    }

    /// The semantic payload. Identical to [`literal`](Self::literal) for
    /// lexical tokens; namespace events carry the prefix or URI here.
    #[inline]
    pub fn content(&self) -> &'a [u8] {
        self.content.unwrap_or(self.literal)
    }

    /// The literal as UTF-8 text.
    pub fn literal_str(&self) -> Result<&'a str> {
        Ok(from_utf8(self.literal)?)
    }

    /// The content as UTF-8 text.
    pub fn content_str(&self) -> Result<&'a str> {
        Ok(from_utf8(self.content())?)
    }

    /// Whether this is the first piece of its logical token.
    #[inline]
    pub fn is_initial(&self) -> bool {
        self.is_initial
    }

    /// Whether this is the last piece of its logical token.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The literal transcoded into `encoding`.
    ///
    /// Unmappable characters are replaced with numeric character
    /// references, as [`Encoding::encode`] does.
    #[cfg(feature = "encoding")]
    pub fn literal_bytes(&self, encoding: &'static Encoding) -> Result<Cow<'a, [u8]>> {
        if encoding == encoding_rs::UTF_8 {
            return Ok(Cow::Borrowed(self.literal));
        }
        let (out, _, _) = encoding.encode(self.literal_str()?);
        Ok(out)
    }
}

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text(")?;
        write_byte_string(f, self.literal)?;
        if let Some(content) = self.content {
            write!(f, ", content=")?;
            write_byte_string(f, content)?;
        }
        write!(f, ", initial={}, final={})", self.is_initial, self.is_final)
    }
}

/// The capability shared by every token producer: advance to the next
/// token kind, then materialise its text on demand.
pub trait TokenSource {
    /// Advertises the kind of the next token, or `None` at the end of the
    /// stream. The token's text is not materialised until [`text`] is
    /// called; a caller that is not interested simply reads on.
    ///
    /// [`text`]: Self::text
    fn read_token(&mut self) -> Result<Option<TokenKind>>;

    /// Materialises the text of the most recently advertised token.
    fn text(&self) -> Text<'_>;

    /// Iterate over token kinds alone, for consumers that never look at
    /// text — counting tags, for example.
    fn kinds(&mut self) -> Kinds<'_, Self>
    where
        Self: Sized,
    {
        Kinds { source: self }
    }
}

/// Iterator over the token kinds of a [`TokenSource`].
#[derive(Debug)]
pub struct Kinds<'a, S> {
    source: &'a mut S,
}

impl<S: TokenSource> Iterator for Kinds<'_, S> {
    type Item = Result<TokenKind>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.read_token().transpose()
    }
}
