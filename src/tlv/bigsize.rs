//! BigSize variable-length integers.
//!
//! BigSize is the varint used throughout the Lightning wire protocol: values
//! below `0xfd` occupy a single byte, larger values are prefixed with `0xfd`,
//! `0xfe` or `0xff` and followed by a 2, 4 or 8 byte big-endian integer.
//! Decoding rejects encodings that are longer than necessary.

use bytes::{Buf, BufMut};

use super::TlvError;

const U16_PREFIX: u8 = 0xfd;
const U32_PREFIX: u8 = 0xfe;
const U64_PREFIX: u8 = 0xff;

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), TlvError> {
    let available = buf.remaining();
    if available < needed {
        return Err(TlvError::UnexpectedEof { needed, available });
    }
    Ok(())
}

/// Read a BigSize value from the front of `buf`.
///
/// # Errors
///
/// Returns [`TlvError::UnexpectedEof`] when `buf` ends early and
/// [`TlvError::NonCanonicalVarint`] when the value could have been encoded in
/// fewer bytes.
///
/// # Examples
///
/// ```
/// use htlc_interceptor::tlv::read_bigsize;
///
/// let mut input: &[u8] = &[0xfd, 0x01, 0x00, 0xaa];
/// assert_eq!(read_bigsize(&mut input).expect("valid varint"), 0x0100);
/// assert_eq!(input, &[0xaa]);
/// ```
pub fn read_bigsize(buf: &mut impl Buf) -> Result<u64, TlvError> {
    ensure_remaining(buf, 1)?;
    let (value, minimum) = match buf.get_u8() {
        U64_PREFIX => {
            ensure_remaining(buf, 8)?;
            (buf.get_u64(), 0x1_0000_0000)
        }
        U32_PREFIX => {
            ensure_remaining(buf, 4)?;
            (u64::from(buf.get_u32()), 0x1_0000)
        }
        U16_PREFIX => {
            ensure_remaining(buf, 2)?;
            (u64::from(buf.get_u16()), u64::from(U16_PREFIX))
        }
        small => return Ok(u64::from(small)),
    };
    if value < minimum {
        return Err(TlvError::NonCanonicalVarint { value });
    }
    Ok(value)
}

/// Append the canonical BigSize encoding of `value` to `out`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "each arm only truncates values already proven to fit"
)]
pub fn write_bigsize(value: u64, out: &mut impl BufMut) {
    match value {
        0..0xfd => out.put_u8(value as u8),
        0xfd..=0xffff => {
            out.put_u8(U16_PREFIX);
            out.put_u16(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            out.put_u8(U32_PREFIX);
            out.put_u32(value as u32);
        }
        _ => {
            out.put_u8(U64_PREFIX);
            out.put_u64(value);
        }
    }
}

/// Number of bytes [`write_bigsize`] emits for `value`.
#[must_use]
pub const fn bigsize_len(value: u64) -> usize {
    match value {
        0..0xfd => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::single_byte(0xfc, &[0xfc])]
    #[case::u16_boundary(0xfd, &[0xfd, 0x00, 0xfd])]
    #[case::u16_max(0xffff, &[0xfd, 0xff, 0xff])]
    #[case::u32_min(0x1_0000, &[0xfe, 0x00, 0x01, 0x00, 0x00])]
    #[case::u64_min(0x1_0000_0000, &[0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00])]
    fn encodes_canonically(#[case] value: u64, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        write_bigsize(value, &mut out);
        assert_eq!(out, expected);
        assert_eq!(bigsize_len(value), expected.len());

        let mut input = expected;
        assert_eq!(read_bigsize(&mut input).expect("decode"), value);
        assert!(input.is_empty());
    }

    #[rstest]
    #[case::u16_small(&[0xfd, 0x00, 0xfc], 0xfc)]
    #[case::u32_small(&[0xfe, 0x00, 0x00, 0xff, 0xff], 0xffff)]
    #[case::u64_small(&[0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff], 0xffff_ffff)]
    fn rejects_non_canonical(#[case] input: &[u8], #[case] value: u64) {
        let mut input = input;
        assert_eq!(
            read_bigsize(&mut input),
            Err(TlvError::NonCanonicalVarint { value })
        );
    }

    #[rstest]
    #[case::empty(&[], 1, 0)]
    #[case::short_u16(&[0xfd, 0x01], 2, 1)]
    #[case::short_u64(&[0xff, 0x01, 0x02], 8, 2)]
    fn reports_truncation(
        #[case] input: &[u8],
        #[case] needed: usize,
        #[case] available: usize,
    ) {
        let mut input = input;
        assert_eq!(
            read_bigsize(&mut input),
            Err(TlvError::UnexpectedEof { needed, available })
        );
    }
}
