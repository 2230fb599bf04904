//! The lexical state machine.
//!
//! [`TokenScanner`] drives the sub-parsers over a [`ChunkBuffer`] and emits
//! one token kind per [`read_token`] call. The machine is a flat loop over
//! an explicit state enum — construct nesting is encoded in states, never
//! in the call stack — and it never aborts on ill-formed content: a stray
//! `<` or `&` becomes a `BadlyFormed*` recovery token, and a stream that
//! ends inside a construct is closed with `BadlyFormedEndOfStream`.
//!
//! [`read_token`]: TokenScanner::read_token

use std::io::Read;

use crate::buffer::{BufChunks, ChunkBuffer, Chunks};
use crate::errors::{Result, SyntaxError};
use crate::parser::{
    ContentPattern, NmTokenParser, PatternRun, Piece, SentinelParser, Step, WhitespaceParser,
};
use crate::tokens::{Text, TokenKind, TokenSource};

/// Where the machine resumes on the next pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    DocStart,
    /// Document-leading whitespace, emitted as markup.
    LeadingWs,
    /// Between markup constructs; dispatches on the next unit.
    Content,
    /// A character-data run is in progress.
    PcData,
    AfterMarkup,
    /// Whitespace directly after a markup construct.
    TrailingWs,
    /// Markup recovery: emit the carried units as one content token.
    BadContent(&'static [u8]),
    /// A `<` was consumed; dispatch on what follows.
    Markup,

    EndTagName,
    EndTagWs,
    EndTagEnd,

    PiTarget,
    PiWs,
    PiDispatch { ws: bool },
    PiData,
    PiEnd,

    CommentData,
    CommentEnd,
    CDataData,
    CDataEnd,

    TagName,
    TagWs,
    /// Inside a tag, before an attribute or the tag close. `ws` records
    /// whether whitespace preceded this point.
    AttrDispatch { ws: bool },
    AttrName,
    AttrNameWs,
    AttrEquals { ws: bool },
    AttrEqualsWs,
    AttrQuote,
    AttrValue { double: bool },
    AttrValueEnd { double: bool },
    AttrPostWs,

    Eos,
}

/// What [`TokenScanner::text`] reads for the current token.
#[derive(Debug, Clone, Copy)]
enum CurrentText {
    None,
    /// The buffer's extract, with the piece flags of the current run.
    Window { is_initial: bool, is_final: bool },
    /// A literal known at compile time (or carried by a recovery state).
    Fixed(&'static [u8]),
}

/// A pull lexer over a lazy sequence of chunks.
///
/// `read_token` advertises the next token's kind; `text` materialises its
/// text as a borrow into the chunk window. See [`TokenSource`] for the
/// protocol and [`crate`] docs for an example.
#[derive(Debug)]
pub struct TokenScanner<I> {
    buf: ChunkBuffer<I>,
    state: State,
    text: CurrentText,
    whitespace: WhitespaceParser,
    name: NmTokenParser,
    sentinel: SentinelParser,
    content: PatternRun,
}

impl<I, C> TokenScanner<I>
where
    I: Iterator<Item = Result<C>>,
    C: AsRef<[u8]>,
{
    /// Creates a scanner over a prepared [`ChunkBuffer`].
    pub fn new(buf: ChunkBuffer<I>) -> Self {
        Self {
            buf,
            state: State::DocStart,
            text: CurrentText::None,
            whitespace: WhitespaceParser::default(),
            name: NmTokenParser::default(),
            sentinel: SentinelParser::default(),
            content: PatternRun::default(),
        }
    }

    /// Advertises the kind of the next token, or `None` at the end of the
    /// stream.
    ///
    /// An `Err` terminates the stream: further calls return `Ok(None)`.
    pub fn read_token(&mut self) -> Result<Option<TokenKind>> {
        match self.scan_next() {
            Ok(token) => Ok(token),
            Err(e) => {
                self.state = State::Eos;
                Err(e)
            }
        }
    }

    /// Materialises the text of the most recently advertised token.
    pub fn text(&self) -> Text<'_> {
        match self.text {
            CurrentText::Window {
                is_initial,
                is_final,
            } => Text::new(self.buf.extract(), is_initial, is_final),
            CurrentText::Fixed(literal) => Text::new(literal, true, true),
            CurrentText::None => Text::new(b"", true, true),
        }
    }

    fn emit_piece(&mut self, kind: TokenKind, piece: Piece) -> Result<Option<TokenKind>> {
        self.text = CurrentText::Window {
            is_initial: piece.is_initial,
            is_final: piece.is_final,
        };
        Ok(Some(kind))
    }

    fn emit_fixed(
        &mut self,
        kind: TokenKind,
        literal: &'static [u8],
        next: State,
    ) -> Result<Option<TokenKind>> {
        self.text = CurrentText::Fixed(literal);
        self.state = next;
        Ok(Some(kind))
    }

    /// The stream ended inside a construct: emit the terminator carrying
    /// any trailing partial literal, then end the stream.
    fn truncated(&mut self, trailing: CurrentText) -> Result<Option<TokenKind>> {
        self.text = trailing;
        self.state = State::Eos;
        Ok(Some(TokenKind::BadlyFormedEndOfStream))
    }

    fn scan_next(&mut self) -> Result<Option<TokenKind>> {
        loop {
            match self.state {
                State::DocStart => {
                    self.whitespace.begin();
                    self.state = State::LeadingWs;
                }
                State::LeadingWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { .. } => self.state = State::Content,
                },

                State::Content => match self.buf.get()? {
                    None => {
                        self.state = State::Eos;
                        return Ok(None);
                    }
                    Some(b'<') => {
                        self.buf.advance(1)?;
                        self.state = State::Markup;
                    }
                    Some(b'&') => {
                        self.buf.advance(1)?;
                        self.text = CurrentText::Fixed(b"&");
                        return Ok(Some(TokenKind::BadlyFormedAmpersand));
                    }
                    Some(_) => {
                        self.content.begin();
                        self.state = State::PcData;
                    }
                },
                State::PcData => match self.content.next_piece(&ContentPattern, &mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::PcData, p),
                    Step::Done { .. } => self.state = State::Content,
                },

                State::AfterMarkup => {
                    self.whitespace.begin();
                    self.state = State::TrailingWs;
                }
                State::TrailingWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::WhitespaceContent, p),
                    Step::Done { .. } => self.state = State::Content,
                },

                State::BadContent(literal) => {
                    return self.emit_fixed(TokenKind::PcData, literal, State::Content);
                }

                State::Markup => return self.dispatch_markup(),

                State::EndTagName => match self.name.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::TagName, p),
                    Step::Done { .. } => {
                        self.whitespace.begin();
                        self.state = State::EndTagWs;
                    }
                },
                State::EndTagWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { .. } => self.state = State::EndTagEnd,
                },
                State::EndTagEnd => match self.buf.get()? {
                    Some(b'>') => {
                        self.buf.advance(1)?;
                        return self.emit_fixed(TokenKind::EndTagClose, b">", State::AfterMarkup);
                    }
                    None => return self.truncated(CurrentText::Fixed(b"")),
                    Some(b) => return Err(SyntaxError::ExpectedEndTagClose(b).into()),
                },

                State::PiTarget => match self.name.next_piece(&mut self.buf)? {
                    Step::Piece(p) => {
                        return self.emit_piece(TokenKind::ProcessingInstructionTarget, p)
                    }
                    Step::Done { .. } => {
                        self.whitespace.begin();
                        self.state = State::PiWs;
                    }
                },
                State::PiWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { found } => self.state = State::PiDispatch { ws: found },
                },
                State::PiDispatch { ws } => {
                    if self.buf.starts_with(b"?>")? {
                        return self.emit_fixed(
                            TokenKind::ProcessingInstructionClose,
                            b"?>",
                            State::AfterMarkup,
                        );
                    }
                    match self.buf.get()? {
                        None => return self.truncated(CurrentText::Fixed(b"")),
                        Some(_) if ws => {
                            self.sentinel.begin(b"?>");
                            self.state = State::PiData;
                        }
                        Some(b) => return Err(SyntaxError::ExpectedPiClose(b).into()),
                    }
                }
                State::PiData => match self.sentinel.next_piece(&mut self.buf)? {
                    Step::Piece(p) => {
                        return self.emit_piece(TokenKind::ProcessingInstructionData, p)
                    }
                    Step::Done { found: true } => self.state = State::PiEnd,
                    Step::Done { found: false } => return self.truncated(CurrentText::Fixed(b"")),
                },
                State::PiEnd => {
                    let ok = self.buf.starts_with(b"?>")?;
                    debug_assert!(ok, "sentinel parser left the buffer before `?>`");
                    return self.emit_fixed(
                        TokenKind::ProcessingInstructionClose,
                        b"?>",
                        State::AfterMarkup,
                    );
                }

                State::CommentData => match self.sentinel.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::CommentData, p),
                    Step::Done { found: true } => self.state = State::CommentEnd,
                    Step::Done { found: false } => return self.truncated(CurrentText::Fixed(b"")),
                },
                State::CommentEnd => {
                    let ok = self.buf.starts_with(b"-->")?;
                    debug_assert!(ok, "sentinel parser left the buffer before `-->`");
                    return self.emit_fixed(TokenKind::CommentClose, b"-->", State::AfterMarkup);
                }

                State::CDataData => match self.sentinel.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::CData, p),
                    Step::Done { found: true } => self.state = State::CDataEnd,
                    Step::Done { found: false } => return self.truncated(CurrentText::Fixed(b"")),
                },
                State::CDataEnd => {
                    let ok = self.buf.starts_with(b"]]>")?;
                    debug_assert!(ok, "sentinel parser left the buffer before `]]>`");
                    return self.emit_fixed(TokenKind::CDataClose, b"]]>", State::AfterMarkup);
                }

                State::TagName => match self.name.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::TagName, p),
                    Step::Done { .. } => {
                        self.whitespace.begin();
                        self.state = State::TagWs;
                    }
                },
                State::TagWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { found } => self.state = State::AttrDispatch { ws: found },
                },
                State::AttrDispatch { ws } => match self.buf.get()? {
                    None => return self.truncated(CurrentText::Fixed(b"")),
                    Some(b'>') => {
                        self.buf.advance(1)?;
                        return self.emit_fixed(TokenKind::StartTagClose, b">", State::AfterMarkup);
                    }
                    Some(b'/') => {
                        if self.buf.starts_with(b"/>")? {
                            return self.emit_fixed(
                                TokenKind::EmptyTagClose,
                                b"/>",
                                State::AfterMarkup,
                            );
                        }
                        self.buf.advance(1)?;
                        match self.buf.get()? {
                            None => {
                                return self.truncated(CurrentText::Window {
                                    is_initial: true,
                                    is_final: true,
                                })
                            }
                            Some(b) => return Err(SyntaxError::ExpectedEmptyTagClose(b).into()),
                        }
                    }
                    Some(b) => match self.buf.peek_char()? {
                        Some(c) if NmTokenParser::matches_initial(c) => {
                            if !ws {
                                return Err(SyntaxError::ExpectedWhitespace.into());
                            }
                            self.name.begin();
                            self.state = State::AttrName;
                        }
                        _ => return Err(SyntaxError::ExpectedAttributeName(b).into()),
                    },
                },
                State::AttrName => match self.name.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::AttributeName, p),
                    Step::Done { .. } => {
                        self.whitespace.begin();
                        self.state = State::AttrNameWs;
                    }
                },
                State::AttrNameWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { found } => self.state = State::AttrEquals { ws: found },
                },
                State::AttrEquals { ws } => match self.buf.get()? {
                    Some(b'=') => {
                        self.buf.advance(1)?;
                        self.whitespace.begin();
                        return self.emit_fixed(
                            TokenKind::AttributeEquals,
                            b"=",
                            State::AttrEqualsWs,
                        );
                    }
                    None => return self.truncated(CurrentText::Fixed(b"")),
                    // An attribute without a value; let the tag loop decide
                    // what the next unit means.
                    Some(_) => self.state = State::AttrDispatch { ws },
                },
                State::AttrEqualsWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { .. } => self.state = State::AttrQuote,
                },
                State::AttrQuote => match self.buf.get()? {
                    Some(b'"') => {
                        self.buf.advance(1)?;
                        self.sentinel.begin(b"\"");
                        return self.emit_fixed(
                            TokenKind::AttributeValueDoubleOpen,
                            b"\"",
                            State::AttrValue { double: true },
                        );
                    }
                    Some(b'\'') => {
                        self.buf.advance(1)?;
                        self.sentinel.begin(b"'");
                        return self.emit_fixed(
                            TokenKind::AttributeValueSingleOpen,
                            b"'",
                            State::AttrValue { double: false },
                        );
                    }
                    None => return self.truncated(CurrentText::Fixed(b"")),
                    Some(b) => return Err(SyntaxError::UnquotedValue(b).into()),
                },
                State::AttrValue { double } => match self.sentinel.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::AttributeValue, p),
                    Step::Done { found: true } => self.state = State::AttrValueEnd { double },
                    Step::Done { found: false } => return self.truncated(CurrentText::Fixed(b"")),
                },
                State::AttrValueEnd { double } => {
                    let (quote, kind): (&'static [u8], _) = if double {
                        (b"\"", TokenKind::AttributeValueDoubleClose)
                    } else {
                        (b"'", TokenKind::AttributeValueSingleClose)
                    };
                    let ok = self.buf.starts_with(quote)?;
                    debug_assert!(ok, "sentinel parser left the buffer before the quote");
                    self.whitespace.begin();
                    return self.emit_fixed(kind, quote, State::AttrPostWs);
                }
                State::AttrPostWs => match self.whitespace.next_piece(&mut self.buf)? {
                    Step::Piece(p) => return self.emit_piece(TokenKind::MarkupWhitespace, p),
                    Step::Done { found } => self.state = State::AttrDispatch { ws: found },
                },

                State::Eos => return Ok(None),
            }
        }
    }

    /// A `<` was just consumed; decide what construct follows.
    fn dispatch_markup(&mut self) -> Result<Option<TokenKind>> {
        match self.buf.get()? {
            Some(b'/') => {
                self.buf.advance(1)?;
                match self.buf.peek_char()? {
                    Some(c) if NmTokenParser::matches_initial(c) => {
                        self.name.begin();
                        self.emit_fixed(TokenKind::EndTagOpen, b"</", State::EndTagName)
                    }
                    _ => self.emit_fixed(
                        TokenKind::BadlyFormedLessThan,
                        b"<",
                        State::BadContent(b"/"),
                    ),
                }
            }
            Some(b'?') => {
                self.buf.advance(1)?;
                match self.buf.peek_char()? {
                    Some(c) if NmTokenParser::matches_initial(c) => {
                        self.name.begin();
                        self.emit_fixed(
                            TokenKind::ProcessingInstructionOpen,
                            b"<?",
                            State::PiTarget,
                        )
                    }
                    _ => self.emit_fixed(
                        TokenKind::BadlyFormedLessThan,
                        b"<",
                        State::BadContent(b"?"),
                    ),
                }
            }
            Some(b'!') => {
                if self.buf.starts_with(b"!--")? {
                    self.sentinel.begin(b"-->");
                    return self.emit_fixed(TokenKind::CommentOpen, b"<!--", State::CommentData);
                }
                if self.buf.starts_with(b"![CDATA[")? {
                    self.sentinel.begin(b"]]>");
                    return self.emit_fixed(TokenKind::CDataOpen, b"<![CDATA[", State::CDataData);
                }
                if self.buf.starts_with(b"!-")? {
                    return self.emit_fixed(
                        TokenKind::BadlyFormedLessThan,
                        b"<",
                        State::BadContent(b"!-"),
                    );
                }
                self.buf.advance(1)?;
                match self.buf.get()? {
                    Some(b'[') => Err(crate::errors::Error::Unsupported("markup declaration")),
                    Some(b) if b.is_ascii_alphabetic() => {
                        Err(crate::errors::Error::Unsupported("markup declaration"))
                    }
                    _ => self.emit_fixed(
                        TokenKind::BadlyFormedLessThan,
                        b"<",
                        State::BadContent(b"!"),
                    ),
                }
            }
            None => self.emit_fixed(TokenKind::BadlyFormedLessThan, b"<", State::Content),
            Some(_) => match self.buf.peek_char()? {
                Some(c) if NmTokenParser::matches_initial(c) => {
                    self.name.begin();
                    self.emit_fixed(TokenKind::StartOrEmptyTagOpen, b"<", State::TagName)
                }
                _ => self.emit_fixed(TokenKind::BadlyFormedLessThan, b"<", State::Content),
            },
        }
    }
}

impl<I> TokenScanner<Chunks<I>>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    /// Creates a scanner over an iterator of plain chunks, such as string
    /// slices arriving from a decoder.
    pub fn from_chunks<T>(chunks: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self::new(ChunkBuffer::from_chunks(chunks))
    }
}

impl<R: Read> TokenScanner<BufChunks<R>> {
    /// Creates a scanner reading chunks from `reader`.
    pub fn from_reader(reader: R) -> Self {
        Self::new(ChunkBuffer::new(BufChunks::new(reader)))
    }
}

impl<I, C> TokenSource for TokenScanner<I>
where
    I: Iterator<Item = Result<C>>,
    C: AsRef<[u8]>,
{
    fn read_token(&mut self) -> Result<Option<TokenKind>> {
        TokenScanner::read_token(self)
    }

    fn text(&self) -> Text<'_> {
        TokenScanner::text(self)
    }
}
