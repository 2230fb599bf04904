//! A windowed view over a lazy sequence of chunks.
//!
//! [`ChunkBuffer`] makes an iterator of byte chunks — network reads, file
//! blocks, string slices — look like one contiguous sequence. The scanner
//! matches and extracts against the window; the buffer pulls more chunks on
//! demand and discards what has already been consumed, so the whole input is
//! never materialised.
//!
//! Two indices delimit the most recently matched substring: `start` and
//! `cursor`, with `0 <= start <= cursor <= window length`. [`extract`]
//! returns `window[start..cursor]` and stays valid until the next call that
//! may refill (and therefore compact) the window.
//!
//! [`extract`]: ChunkBuffer::extract

use std::io::{self, Read};
use std::iter::Map;

use crate::errors::{Error, Result};
use crate::utils::{decode_step, Utf8Step};

/// Outcome of an anchored match or a sentinel scan against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matched {
    /// `n` units matched and the match ran to the end of the window; a
    /// later call, after more chunks arrive, may extend it.
    Partial(usize),
    /// `n` units matched, bounded inside the window by a non-matching unit,
    /// the sentinel, or the end of the stream.
    Complete(usize),
    /// Nothing matched; [`ChunkBuffer::extract`] returns an empty slice.
    None,
}

/// Result of matching a pattern against the front of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrefixLen {
    /// This many units match and the match may continue past the end of
    /// the slice.
    Open(usize),
    /// This many units match and the next unit does not.
    Closed(usize),
}

/// An anchored pattern over raw code units.
pub(crate) trait Pattern {
    /// Returns the length of the maximal matching prefix of `input`.
    fn match_prefix(&self, input: &[u8]) -> PrefixLen;
}

/// Presents a lazy chunk sequence as a single addressable window.
///
/// The chunk iterator yields `Result<C>` so that upstream failures (for
/// example I/O errors from [`BufChunks`]) propagate unchanged. End of the
/// iterator is end of stream, which is never an error.
#[derive(Debug)]
pub struct ChunkBuffer<I> {
    iter: I,
    window: Vec<u8>,
    start: usize,
    cursor: usize,
    exhausted: bool,
}

impl<I, C> ChunkBuffer<I>
where
    I: Iterator<Item = Result<C>>,
    C: AsRef<[u8]>,
{
    /// Creates a buffer over a chunk iterator.
    pub fn new(iter: I) -> Self {
        Self {
            iter,
            window: Vec::new(),
            start: 0,
            cursor: 0,
            exhausted: false,
        }
    }

    /// Number of units available between the cursor and the window end.
    #[inline]
    fn available(&self) -> usize {
        self.window.len() - self.cursor
    }

    /// Guarantees that at least `n` units are available from the cursor,
    /// pulling upstream chunks as needed.
    ///
    /// Returns the cursor position, or `None` if the stream ended before
    /// `n` units could be made available. Refilling compacts the window:
    /// everything before the cursor is discarded and the indices reset, so
    /// a previous [`extract`] slice must not be relied upon afterwards.
    ///
    /// [`extract`]: Self::extract
    pub fn ensure(&mut self, n: usize) -> Result<Option<usize>> {
        if self.available() >= n {
            return Ok(Some(self.cursor));
        }
        if self.exhausted {
            return Ok(None);
        }
        if self.cursor > 0 {
            self.window.drain(..self.cursor);
            self.start = 0;
            self.cursor = 0;
        }
        while self.window.len() < n {
            match self.iter.next() {
                Some(chunk) => self.window.extend_from_slice(chunk?.as_ref()),
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
        Ok(Some(self.cursor))
    }

    /// Returns the unit at the cursor without advancing, or `None` at the
    /// end of the stream.
    pub fn get(&mut self) -> Result<Option<u8>> {
        match self.ensure(1)? {
            Some(pos) => Ok(Some(self.window[pos])),
            None => Ok(None),
        }
    }

    /// Advances the cursor by `n` units; [`extract`] returns the skipped
    /// units. The caller has checked that `n` units are available.
    ///
    /// [`extract`]: Self::extract
    pub fn advance(&mut self, n: usize) -> Result<()> {
        match self.ensure(n)? {
            Some(pos) => {
                self.start = pos;
                self.cursor = pos + n;
            }
            None => {
                self.start = self.cursor;
                self.cursor = self.window.len();
            }
        }
        Ok(())
    }

    /// Advances by one unit and returns the unit now at the cursor.
    pub fn next_unit(&mut self) -> Result<Option<u8>> {
        self.advance(1)?;
        self.get()
    }

    /// The most recently matched substring of the window.
    #[inline]
    pub fn extract(&self) -> &[u8] {
        &self.window[self.start..self.cursor]
    }

    /// Decodes the UTF-8 scalar at the cursor without consuming it.
    ///
    /// Sequences that are invalid, or that remain incomplete at the end of
    /// the stream, decode to `U+FFFD`.
    pub(crate) fn peek_char(&mut self) -> Result<Option<char>> {
        let mut need = 1;
        loop {
            if self.ensure(need)?.is_none() && self.available() == 0 {
                return Ok(None);
            }
            match decode_step(&self.window[self.cursor..]) {
                Utf8Step::Scalar(c, _) => return Ok(Some(c)),
                Utf8Step::Incomplete if !self.exhausted => need = self.available() + 1,
                _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }
    }

    /// Attempts to match `pat` anchored at the cursor.
    ///
    /// On a non-empty match, `start` is left at the old cursor and the
    /// cursor at the end of the match, so [`extract`] returns the matched
    /// units. [`Matched::Partial`] means the match reached the window end
    /// and a later call may extend it; [`Matched::Complete`] means it was
    /// bounded by a non-matching unit. On [`Matched::None`] the extract is
    /// empty.
    ///
    /// [`extract`]: Self::extract
    pub(crate) fn matching<P: Pattern>(&mut self, pat: &P) -> Result<Matched> {
        let mut need = 1;
        loop {
            if self.ensure(need)?.is_none() && self.available() == 0 {
                self.start = self.cursor;
                return Ok(Matched::None);
            }
            let cursor = self.cursor;
            let m = match pat.match_prefix(&self.window[cursor..]) {
                // A trailing partial sequence cannot be decided yet; pull
                // at least one more unit and rescan.
                PrefixLen::Open(0) if !self.exhausted => {
                    need = self.available() + 1;
                    continue;
                }
                // Nothing can extend a match once the upstream is done.
                PrefixLen::Open(n) if self.exhausted => PrefixLen::Closed(n),
                m => m,
            };
            return Ok(match m {
                PrefixLen::Open(n) => {
                    self.start = cursor;
                    self.cursor = cursor + n;
                    Matched::Partial(n)
                }
                PrefixLen::Closed(0) => {
                    self.start = self.cursor;
                    Matched::None
                }
                PrefixLen::Closed(n) => {
                    self.start = cursor;
                    self.cursor = cursor + n;
                    Matched::Complete(n)
                }
            });
        }
    }

    /// Searches for `sentinel` starting at the cursor. The sentinel itself
    /// is never consumed.
    ///
    /// [`Matched::Partial`] — content up to the window end, sentinel not
    /// yet located. [`Matched::Complete`] — content bounded by a sentinel
    /// occurrence or by the end of the stream. [`Matched::None`] — the
    /// sentinel or the end of the stream is immediately at the cursor.
    ///
    /// When a window suffix equals a proper prefix of the sentinel, that
    /// suffix is kept out of the content so the next call, after a refill,
    /// rescans it across the chunk boundary.
    pub fn match_to_sentinel(&mut self, sentinel: &[u8]) -> Result<Matched> {
        debug_assert!(!sentinel.is_empty());
        if self.ensure(sentinel.len())?.is_none() {
            // Too few units remain for the sentinel to ever appear.
            self.start = self.cursor;
            self.cursor = self.window.len();
            let n = self.cursor - self.start;
            return Ok(if n == 0 { Matched::None } else { Matched::Complete(n) });
        }
        let cursor = self.cursor;
        let hay = &self.window[cursor..];
        match find(hay, sentinel) {
            Some(0) => {
                self.start = cursor;
                Ok(Matched::None)
            }
            Some(n) => {
                self.start = cursor;
                self.cursor = cursor + n;
                Ok(Matched::Complete(n))
            }
            None if self.exhausted => {
                self.start = cursor;
                self.cursor = self.window.len();
                Ok(Matched::Complete(self.cursor - cursor))
            }
            None => {
                let keep = (1..sentinel.len())
                    .rev()
                    .find(|&k| hay.ends_with(&sentinel[..k]))
                    .unwrap_or(0);
                self.start = cursor;
                self.cursor = self.window.len() - keep;
                Ok(Matched::Partial(self.cursor - cursor))
            }
        }
    }

    /// Non-consuming test whether the units at the cursor equal `s`.
    pub(crate) fn looking_at(&mut self, s: &[u8]) -> Result<bool> {
        match self.ensure(s.len())? {
            Some(pos) => Ok(self.window[pos..pos + s.len()] == *s),
            None => Ok(false),
        }
    }

    /// If the next units equal `s`, consumes them (so [`extract`] returns
    /// `s`) and returns `true`; otherwise consumes nothing.
    ///
    /// [`extract`]: Self::extract
    pub fn starts_with(&mut self, s: &[u8]) -> Result<bool> {
        match self.ensure(s.len())? {
            Some(pos) if self.window[pos..pos + s.len()] == *s => {
                self.start = pos;
                self.cursor = pos + s.len();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// A chunk iterator adapter that wraps every chunk of an infallible
/// iterator in `Ok`.
pub type Chunks<I> = Map<I, fn(<I as Iterator>::Item) -> Result<<I as Iterator>::Item>>;

impl<I> ChunkBuffer<Chunks<I>>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    /// Creates a buffer over an iterator of plain chunks, such as an array
    /// of string slices.
    pub fn from_chunks<T>(chunks: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        ChunkBuffer::new(chunks.into_iter().map(Ok as fn(I::Item) -> Result<I::Item>))
    }
}

/// Finds the first full occurrence of `needle` in `hay`.
fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(p) = memchr::memchr(needle[0], &hay[offset..]) {
        let at = offset + p;
        if hay.len() - at < needle.len() {
            // Any later occurrence is even closer to the window end.
            return None;
        }
        if hay[at..at + needle.len()] == *needle {
            return Some(at);
        }
        offset = at + 1;
    }
    None
}

/// Adapts a [`Read`] implementor into a chunk iterator for [`ChunkBuffer`].
#[derive(Debug)]
pub struct BufChunks<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> BufChunks<R> {
    /// Wraps `reader`, reading chunks of the default size (8 KiB).
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, 8 * 1024)
    }

    /// Wraps `reader` with an explicit chunk size.
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self { reader, chunk_size }
    }
}

impl<R: Read> Iterator for BufChunks<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = vec![0; self.chunk_size];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => return None,
                Ok(n) => {
                    chunk.truncate(n);
                    return Some(Ok(chunk));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buf(chunks: &[&str]) -> ChunkBuffer<Chunks<std::vec::IntoIter<Vec<u8>>>> {
        let owned: Vec<Vec<u8>> = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        ChunkBuffer::from_chunks(owned)
    }

    struct Ws;
    impl Pattern for Ws {
        fn match_prefix(&self, input: &[u8]) -> PrefixLen {
            match input.iter().position(|&b| b != b' ') {
                Some(n) => PrefixLen::Closed(n),
                None => PrefixLen::Open(input.len()),
            }
        }
    }

    #[test]
    fn get_does_not_advance() {
        let mut b = buf(&["ab"]);
        assert_eq!(b.get().unwrap(), Some(b'a'));
        assert_eq!(b.get().unwrap(), Some(b'a'));
    }

    #[test]
    fn next_unit_walks_across_chunks() {
        let mut b = buf(&["a", "", "bc"]);
        assert_eq!(b.get().unwrap(), Some(b'a'));
        assert_eq!(b.next_unit().unwrap(), Some(b'b'));
        assert_eq!(b.next_unit().unwrap(), Some(b'c'));
        assert_eq!(b.next_unit().unwrap(), None);
    }

    #[test]
    fn advance_sets_extract() {
        let mut b = buf(&["abcdef"]);
        b.advance(2).unwrap();
        assert_eq!(b.extract(), b"ab");
        b.advance(3).unwrap();
        assert_eq!(b.extract(), b"cde");
    }

    #[test]
    fn ensure_spans_chunks() {
        let mut b = buf(&["ab", "cd", "ef"]);
        assert_eq!(b.ensure(5).unwrap(), Some(0));
        b.advance(5).unwrap();
        assert_eq!(b.extract(), b"abcde");
    }

    #[test]
    fn ensure_reports_exhaustion() {
        let mut b = buf(&["ab"]);
        assert_eq!(b.ensure(3).unwrap(), None);
        // the short remainder is still there
        assert_eq!(b.get().unwrap(), Some(b'a'));
    }

    #[test]
    fn matching_bounded_inside_window() {
        let mut b = buf(&["   foo"]);
        assert_eq!(b.matching(&Ws).unwrap(), Matched::Complete(3));
        assert_eq!(b.extract(), b"   ");
        assert_eq!(b.get().unwrap(), Some(b'f'));
    }

    #[test]
    fn matching_to_window_end_then_empty() {
        let mut b = buf(&["  ", " foo"]);
        assert_eq!(b.matching(&Ws).unwrap(), Matched::Partial(2));
        assert_eq!(b.extract(), b"  ");
        assert_eq!(b.matching(&Ws).unwrap(), Matched::Complete(1));
        assert_eq!(b.extract(), b" ");
        assert_eq!(b.matching(&Ws).unwrap(), Matched::None);
        assert_eq!(b.extract(), b"");
    }

    #[test]
    fn matching_none_on_eos() {
        let mut b = buf(&[" "]);
        assert_eq!(b.matching(&Ws).unwrap(), Matched::Partial(1));
        assert_eq!(b.matching(&Ws).unwrap(), Matched::None);
    }

    #[test]
    fn sentinel_at_cursor() {
        let mut b = buf(&["?>fix"]);
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::None);
        assert_eq!(b.extract(), b"");
        assert_eq!(b.get().unwrap(), Some(b'?'));
    }

    #[test]
    fn sentinel_after_content() {
        let mut b = buf(&["more?>fix"]);
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::Complete(4));
        assert_eq!(b.extract(), b"more");
        assert_eq!(b.get().unwrap(), Some(b'?'));
    }

    #[test]
    fn sentinel_prefix_left_for_rescan() {
        let mut b = buf(&["ab--", ">rest"]);
        assert_eq!(b.match_to_sentinel(b"-->").unwrap(), Matched::Partial(2));
        assert_eq!(b.extract(), b"ab");
        assert_eq!(b.match_to_sentinel(b"-->").unwrap(), Matched::None);
        assert!(b.starts_with(b"-->").unwrap());
        assert_eq!(b.get().unwrap(), Some(b'r'));
    }

    #[test]
    fn sentinel_split_mid_sequence() {
        // ensure() refills to the sentinel length before the scan
        let mut b = buf(&["a-", "->b"]);
        assert_eq!(b.match_to_sentinel(b"-->").unwrap(), Matched::Complete(1));
        assert_eq!(b.extract(), b"a");
        assert_eq!(b.match_to_sentinel(b"-->").unwrap(), Matched::None);
        assert!(b.starts_with(b"-->").unwrap());
    }

    #[test]
    fn sentinel_missing_at_eos() {
        let mut b = buf(&["morefix?"]);
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::Partial(7));
        assert_eq!(b.extract(), b"morefix");
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::Complete(1));
        assert_eq!(b.extract(), b"?");
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::None);
        assert_eq!(b.get().unwrap(), None);
    }

    #[test]
    fn sentinel_on_empty_stream() {
        let mut b = buf(&[""]);
        assert_eq!(b.match_to_sentinel(b"?>").unwrap(), Matched::None);
        assert_eq!(b.extract(), b"");
    }

    #[test]
    fn false_sentinel_start_rescanned() {
        // `-` starts like the sentinel but the full window disproves it
        let mut b = buf(&["a-b-->"]);
        assert_eq!(b.match_to_sentinel(b"-->").unwrap(), Matched::Complete(3));
        assert_eq!(b.extract(), b"a-b");
    }

    #[test]
    fn starts_with_consumes_only_on_match() {
        let mut b = buf(&["<?xml"]);
        assert!(!b.starts_with(b"<!").unwrap());
        assert!(b.starts_with(b"<?").unwrap());
        assert_eq!(b.extract(), b"<?");
        assert_eq!(b.get().unwrap(), Some(b'x'));
    }

    #[test]
    fn starts_with_spans_chunks() {
        let mut b = buf(&["<", "?", "xml"]);
        assert!(b.starts_with(b"<?").unwrap());
        assert_eq!(b.get().unwrap(), Some(b'x'));
    }

    #[test]
    fn looking_at_never_consumes() {
        let mut b = buf(&["?>"]);
        assert!(b.looking_at(b"?>").unwrap());
        assert_eq!(b.get().unwrap(), Some(b'?'));
        assert!(!b.looking_at(b"?>x").unwrap());
    }

    #[test]
    fn peek_char_decodes_across_chunks() {
        let bytes = "é".as_bytes();
        let mut b = ChunkBuffer::from_chunks(vec![vec![bytes[0]], vec![bytes[1]]]);
        assert_eq!(b.peek_char().unwrap(), Some('é'));
        // still not consumed
        assert_eq!(b.get().unwrap(), Some(bytes[0]));
    }

    #[test]
    fn peek_char_replaces_truncated_sequence() {
        let bytes = "é".as_bytes();
        let mut b = ChunkBuffer::from_chunks(vec![vec![bytes[0]]]);
        assert_eq!(b.peek_char().unwrap(), Some(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn upstream_error_propagates() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"ab".to_vec()),
            Err(Error::Io(io::Error::new(io::ErrorKind::Other, "boom"))),
        ];
        let mut b = ChunkBuffer::new(chunks.into_iter());
        b.advance(2).unwrap();
        assert!(matches!(b.get(), Err(Error::Io(_))));
    }
}
