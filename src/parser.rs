//! Restartable sub-parsers driving the two-phase pull protocol.
//!
//! Each sub-parser is fed the shared [`ChunkBuffer`] one call at a time and
//! either advertises a piece — the buffer's `extract()` then holds the
//! piece's text until the scanner materialises or discards it — or reports
//! that its run is over. A run that straddles window reloads produces
//! several pieces; exactly one piece per logical token carries `is_final`.

use crate::buffer::{ChunkBuffer, Matched, Pattern, PrefixLen};
use crate::errors::Result;
use crate::utils::{decode_step, Utf8Step};

/// Position flags of one advertised piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Piece {
    pub is_initial: bool,
    pub is_final: bool,
}

/// What a sub-parser produced on one pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A piece is pending; the buffer's extract holds its text.
    Piece(Piece),
    /// The run is over: `found` tells whether anything was recognised
    /// (for a sentinel run, whether the sentinel was located).
    Done { found: bool },
}

/// Shared state machine for pattern-driven runs (whitespace, names,
/// content). Restart with [`begin`](Self::begin).
#[derive(Debug, Default)]
pub(crate) struct PatternRun {
    found: bool,
    emitted: bool,
    done: Option<bool>,
}

impl PatternRun {
    pub fn begin(&mut self) {
        *self = Self::default();
    }

    /// Whether the run has not consumed or decided anything yet.
    fn pristine(&self) -> bool {
        !self.emitted && self.done.is_none()
    }

    fn fail(&mut self) -> Step {
        self.done = Some(false);
        Step::Done { found: false }
    }

    pub fn next_piece<P, I, C>(&mut self, pat: &P, buf: &mut ChunkBuffer<I>) -> Result<Step>
    where
        P: Pattern,
        I: Iterator<Item = Result<C>>,
        C: AsRef<[u8]>,
    {
        if let Some(found) = self.done {
            return Ok(Step::Done { found });
        }
        match buf.matching(pat)? {
            Matched::Partial(_) => {
                self.found = true;
                let piece = Piece {
                    is_initial: !self.emitted,
                    is_final: false,
                };
                self.emitted = true;
                Ok(Step::Piece(piece))
            }
            Matched::Complete(_) => {
                self.found = true;
                self.done = Some(true);
                let piece = Piece {
                    is_initial: !self.emitted,
                    is_final: true,
                };
                self.emitted = true;
                Ok(Step::Piece(piece))
            }
            Matched::None => {
                if self.emitted {
                    // End of stream turned up one call after the run filled
                    // the window; close the token with an empty final piece.
                    self.done = Some(true);
                    Ok(Step::Piece(Piece {
                        is_initial: false,
                        is_final: true,
                    }))
                } else {
                    let found = self.found;
                    self.done = Some(found);
                    Ok(Step::Done { found })
                }
            }
        }
    }
}

/// Matches the maximal run of `space`, `tab`, `CR`, `LF`.
#[derive(Debug, Default)]
pub(crate) struct WhitespaceParser {
    run: PatternRun,
}

impl WhitespaceParser {
    pub fn begin(&mut self) {
        self.run.begin();
    }

    pub fn next_piece<I, C>(&mut self, buf: &mut ChunkBuffer<I>) -> Result<Step>
    where
        I: Iterator<Item = Result<C>>,
        C: AsRef<[u8]>,
    {
        self.run.next_piece(&WhitespacePattern, buf)
    }
}

/// Matches an XML-style name: a name-start character followed by name
/// characters.
///
/// The start test only applies to the very first unit of the run. A name
/// continued after a window reload never re-applies it, so `foo` followed
/// by a chunk starting `-bar` still lexes as one name.
#[derive(Debug, Default)]
pub(crate) struct NmTokenParser {
    run: PatternRun,
}

impl NmTokenParser {
    pub fn begin(&mut self) {
        self.run.begin();
    }

    /// Whether `ch` can start a name: a Unicode letter, `_` or `:`.
    /// Digits, dots and dashes can only continue one.
    pub fn matches_initial(ch: char) -> bool {
        ch.is_alphabetic() || matches!(ch, '_' | ':')
    }

    pub fn next_piece<I, C>(&mut self, buf: &mut ChunkBuffer<I>) -> Result<Step>
    where
        I: Iterator<Item = Result<C>>,
        C: AsRef<[u8]>,
    {
        if self.run.pristine() {
            match buf.peek_char()? {
                Some(c) if Self::matches_initial(c) => {}
                _ => return Ok(self.run.fail()),
            }
        }
        self.run.next_piece(&NameCharsPattern, buf)
    }
}

/// Scans content up to a sentinel string or the end of the stream.
///
/// The sentinel is never consumed: after `Done { found: true }` the buffer
/// still sits on its first unit, and the scanner takes it with
/// `starts_with`. End of stream without the sentinel is `found: false`.
#[derive(Debug)]
pub(crate) struct SentinelParser {
    sentinel: &'static [u8],
    emitted: bool,
    needs_final: bool,
    done: Option<bool>,
}

impl Default for SentinelParser {
    fn default() -> Self {
        Self {
            sentinel: b"",
            emitted: false,
            needs_final: false,
            done: None,
        }
    }
}

impl SentinelParser {
    pub fn begin(&mut self, sentinel: &'static [u8]) {
        *self = Self {
            sentinel,
            ..Self::default()
        };
    }

    pub fn next_piece<I, C>(&mut self, buf: &mut ChunkBuffer<I>) -> Result<Step>
    where
        I: Iterator<Item = Result<C>>,
        C: AsRef<[u8]>,
    {
        if let Some(found) = self.done {
            return Ok(Step::Done { found });
        }
        match buf.match_to_sentinel(self.sentinel)? {
            Matched::Partial(_) => {
                self.needs_final = true;
                let piece = Piece {
                    is_initial: !self.emitted,
                    is_final: false,
                };
                self.emitted = true;
                Ok(Step::Piece(piece))
            }
            Matched::Complete(_) => {
                self.needs_final = false;
                let piece = Piece {
                    is_initial: !self.emitted,
                    is_final: true,
                };
                self.emitted = true;
                Ok(Step::Piece(piece))
            }
            Matched::None => {
                if self.needs_final {
                    self.needs_final = false;
                    Ok(Step::Piece(Piece {
                        is_initial: false,
                        is_final: true,
                    }))
                } else {
                    let found = buf.looking_at(self.sentinel)?;
                    self.done = Some(found);
                    Ok(Step::Done { found })
                }
            }
        }
    }
}

pub(crate) struct WhitespacePattern;

impl Pattern for WhitespacePattern {
    fn match_prefix(&self, input: &[u8]) -> PrefixLen {
        match input.iter().position(|&b| !is_whitespace(b)) {
            Some(n) => PrefixLen::Closed(n),
            None => PrefixLen::Open(input.len()),
        }
    }
}

pub(crate) struct NameCharsPattern;

impl Pattern for NameCharsPattern {
    fn match_prefix(&self, input: &[u8]) -> PrefixLen {
        let mut at = 0;
        while at < input.len() {
            match decode_step(&input[at..]) {
                Utf8Step::Scalar(c, width) if is_name_char(c) => at += width,
                Utf8Step::Incomplete => return PrefixLen::Open(at),
                _ => return PrefixLen::Closed(at),
            }
        }
        PrefixLen::Open(at)
    }
}

/// Units that are neither `<` nor `&`.
pub(crate) struct ContentPattern;

impl Pattern for ContentPattern {
    fn match_prefix(&self, input: &[u8]) -> PrefixLen {
        match memchr::memchr2(b'<', b'&', input) {
            Some(n) => PrefixLen::Closed(n),
            None => PrefixLen::Open(input.len()),
        }
    }
}

/// A function to check whether the unit is a whitespace (blank, new line,
/// carriage return or tab).
#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\r' | b'\n' | b'\t')
}

/// Letters are Unicode; digits and punctuation are ASCII.
fn is_name_char(c: char) -> bool {
    c.is_alphabetic() || c.is_ascii_digit() || matches!(c, '_' | ':' | '.' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Chunks;

    type Buf = ChunkBuffer<Chunks<std::vec::IntoIter<Vec<u8>>>>;

    fn buf(chunks: &[&str]) -> Buf {
        let owned: Vec<Vec<u8>> = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        ChunkBuffer::from_chunks(owned)
    }

    fn piece(parser_step: Step) -> Piece {
        match parser_step {
            Step::Piece(p) => p,
            Step::Done { found } => panic!("expected a piece, got Done {{ found: {} }}", found),
        }
    }

    fn done(parser_step: Step) -> bool {
        match parser_step {
            Step::Done { found } => found,
            Step::Piece(p) => panic!("expected Done, got {:?}", p),
        }
    }

    mod name {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn single_piece() {
            let mut b = buf(&["foo "]);
            let mut p = NmTokenParser::default();
            p.begin();
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"foo");
            assert_eq!((flags.is_initial, flags.is_final), (true, true));
            assert!(done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn empty_final_piece_at_eos() {
            let mut b = buf(&["foo"]);
            let mut p = NmTokenParser::default();
            p.begin();
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"foo");
            assert_eq!((flags.is_initial, flags.is_final), (true, false));
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"");
            assert_eq!((flags.is_initial, flags.is_final), (false, true));
            assert!(done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn start_test_applies_only_to_first_unit() {
            // valid name, but an invalid start unit lands on the boundary
            let mut b = buf(&["foo", "-bar>"]);
            let mut p = NmTokenParser::default();
            p.begin();
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"foo");
            assert_eq!((flags.is_initial, flags.is_final), (true, false));
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"-bar");
            assert_eq!((flags.is_initial, flags.is_final), (false, true));
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'>'));
        }

        #[test]
        fn not_found_consumes_nothing() {
            let mut b = buf(&["123"]);
            let mut p = NmTokenParser::default();
            p.begin();
            assert!(!done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'1'));
        }

        #[test]
        fn unicode_name() {
            let mut b = buf(&["żółć="]);
            let mut p = NmTokenParser::default();
            p.begin();
            piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), "żółć".as_bytes());
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'='));
        }

        #[test]
        fn name_split_inside_a_scalar() {
            let bytes = "éx>".as_bytes();
            let mut b = ChunkBuffer::from_chunks(vec![bytes[..1].to_vec(), bytes[1..].to_vec()]);
            let mut p = NmTokenParser::default();
            p.begin();
            piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), "éx".as_bytes());
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'>'));
        }

        #[test]
        fn initial_classes() {
            for c in "ABCZabcz_:".chars() {
                assert!(NmTokenParser::matches_initial(c), "{:?}", c);
            }
            for c in " \t\n\u{c}\u{b}!\"$%^&*()-+=~#@<>?,.0123456789".chars() {
                assert!(!NmTokenParser::matches_initial(c), "{:?}", c);
            }
            assert!(NmTokenParser::matches_initial('ż'));
        }
    }

    mod whitespace {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn matches_run() {
            let mut b = buf(&["   foo"]);
            let mut p = WhitespaceParser::default();
            p.begin();
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"   ");
            assert_eq!((flags.is_initial, flags.is_final), (true, true));
            assert!(done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn run_to_eos() {
            let mut b = buf(&["   "]);
            let mut p = WhitespaceParser::default();
            p.begin();
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"   ");
            assert!(!flags.is_final);
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"");
            assert!(flags.is_final);
            assert!(done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn empty_run_is_not_found() {
            let mut b = buf(&["foo"]);
            let mut p = WhitespaceParser::default();
            p.begin();
            assert!(!done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'f'));
        }
    }

    mod sentinel {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn sentinel_at_start() {
            let mut b = buf(&["?>fix"]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.extract(), b"");
            assert_eq!(b.get().unwrap(), Some(b'?'));
        }

        #[test]
        fn sentinel_after_content() {
            let mut b = buf(&["more?>fix"]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"more");
            assert!(flags.is_final);
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'?'));
        }

        #[test]
        fn empty_stream_is_not_found() {
            let mut b = buf(&[""]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            assert!(!done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.extract(), b"");
        }

        #[test]
        fn missing_sentinel_is_not_found() {
            let mut b = buf(&["morefix"]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"morefix");
            assert!(!flags.is_final);
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"");
            assert!(flags.is_final);
            assert!(!done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn partial_sentinel_at_eos() {
            let mut b = buf(&["morefix?"]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"morefix");
            assert!(!flags.is_final);
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"?");
            assert!(flags.is_final);
            assert!(!done(p.next_piece(&mut b).unwrap()));
        }

        #[test]
        fn sentinel_found_after_open_piece_owes_a_final() {
            let mut b = buf(&["more", "?>"]);
            let mut p = SentinelParser::default();
            p.begin(b"?>");
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"more");
            assert!(!flags.is_final);
            let flags = piece(p.next_piece(&mut b).unwrap());
            assert_eq!(b.extract(), b"");
            assert!(flags.is_final);
            assert!(done(p.next_piece(&mut b).unwrap()));
            assert_eq!(b.get().unwrap(), Some(b'?'));
        }
    }
}
