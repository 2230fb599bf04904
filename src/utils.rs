use std::fmt;

/// One step of incremental UTF-8 decoding at the front of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Utf8Step {
    /// A whole scalar value and the number of code units it occupies.
    Scalar(char, usize),
    /// The slice ends inside what may still become a valid sequence.
    Incomplete,
    /// The leading code units cannot begin any scalar value.
    Invalid,
}

/// Decodes the scalar value at the front of `input` without assuming the
/// rest of the slice is valid UTF-8.
pub(crate) fn decode_step(input: &[u8]) -> Utf8Step {
    if input.is_empty() {
        return Utf8Step::Incomplete;
    }
    let take = input.len().min(4);
    match std::str::from_utf8(&input[..take]) {
        Ok(s) => match s.chars().next() {
            Some(c) => Utf8Step::Scalar(c, c.len_utf8()),
            None => Utf8Step::Incomplete,
        },
        Err(e) if e.valid_up_to() > 0 => {
            // The first scalar is complete even though a later one is not.
            match std::str::from_utf8(&input[..e.valid_up_to()])
                .ok()
                .and_then(|s| s.chars().next())
            {
                Some(c) => Utf8Step::Scalar(c, c.len_utf8()),
                None => Utf8Step::Invalid,
            }
        }
        Err(e) => match e.error_len() {
            None => Utf8Step::Incomplete,
            Some(_) => Utf8Step::Invalid,
        },
    }
}

pub(crate) fn write_byte_string(f: &mut fmt::Formatter<'_>, byte_string: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for b in byte_string {
        match *b {
            32..=33 | 35..=126 => write!(f, "{}", *b as char)?,
            34 => write!(f, "\\\"")?,
            _ => write!(f, "{:#02X}", b)?,
        }
    }
    write!(f, "\"")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_scalar() {
        assert_eq!(decode_step(b"a"), Utf8Step::Scalar('a', 1));
        assert_eq!(decode_step(b"abc"), Utf8Step::Scalar('a', 1));
    }

    #[test]
    fn multi_byte_scalar() {
        assert_eq!(decode_step("é".as_bytes()), Utf8Step::Scalar('é', 2));
        assert_eq!(decode_step("日本".as_bytes()), Utf8Step::Scalar('日', 3));
    }

    #[test]
    fn split_sequence_is_incomplete() {
        let bytes = "é".as_bytes();
        assert_eq!(decode_step(&bytes[..1]), Utf8Step::Incomplete);
        assert_eq!(decode_step(b""), Utf8Step::Incomplete);
    }

    #[test]
    fn first_scalar_complete_second_split() {
        let bytes = "éé".as_bytes();
        assert_eq!(decode_step(&bytes[..3]), Utf8Step::Scalar('é', 2));
    }

    #[test]
    fn stray_continuation_is_invalid() {
        assert_eq!(decode_step(b"\x80abc"), Utf8Step::Invalid);
        assert_eq!(decode_step(b"\xC3\x28"), Utf8Step::Invalid);
    }
}
