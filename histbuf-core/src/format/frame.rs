//! Container frame parsing and emission
//!
//! A writer emits the opening magic, streams the payload, and only then
//! writes the footer pointing back at the payload start. A reader therefore
//! treats a missing footer as a torn write and refuses the container.

use core::ops::Range;

use super::constants::{FOOTER_SIZE, FRAMING_OVERHEAD, MAGIC, MAGIC_SIZE, OFFSET_SIZE};
use crate::error::{HistError, Result};

/// Build the trailing footer for a payload starting at `offset`
pub const fn footer(offset: u64) -> [u8; FOOTER_SIZE] {
    let le = offset.to_le_bytes();
    let mut out = [0u8; FOOTER_SIZE];
    let mut i = 0;
    while i < OFFSET_SIZE {
        out[i] = le[i];
        i += 1;
    }
    let mut j = 0;
    while j < MAGIC_SIZE {
        out[OFFSET_SIZE + j] = MAGIC[j];
        j += 1;
    }
    out
}

/// Locate the payload inside a complete container
pub fn payload_range(bytes: &[u8]) -> Result<Range<usize>> {
    if bytes.len() < FRAMING_OVERHEAD {
        return Err(HistError::container(alloc::format!(
            "container is {} bytes; at least {} are needed for the framing",
            bytes.len(),
            FRAMING_OVERHEAD
        )));
    }
    if bytes[..MAGIC_SIZE] != MAGIC {
        return Err(HistError::container("container does not begin with magic 'hist'"));
    }
    let len = bytes.len();
    if bytes[len - MAGIC_SIZE..] != MAGIC {
        return Err(HistError::container("container does not end with magic 'hist'"));
    }

    let footer_start = len - FOOTER_SIZE;
    let mut raw = [0u8; OFFSET_SIZE];
    raw.copy_from_slice(&bytes[footer_start..footer_start + OFFSET_SIZE]);
    let offset = u64::from_le_bytes(raw);

    if offset < MAGIC_SIZE as u64 || offset > footer_start as u64 {
        return Err(HistError::container(alloc::format!(
            "payload offset {offset} lies outside [{MAGIC_SIZE}, {footer_start}]"
        )));
    }
    Ok(offset as usize..footer_start)
}

/// Borrow the payload of a complete container
pub fn payload(bytes: &[u8]) -> Result<&[u8]> {
    let range = payload_range(bytes)?;
    Ok(&bytes[range])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;
    use alloc::vec::Vec;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(body);
        out.extend_from_slice(&footer(MAGIC_SIZE as u64));
        out
    }

    #[test]
    fn test_footer_layout() {
        let f = footer(4);
        assert_eq!(&f[..8], &[4, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&f[8..], b"hist");
    }

    #[test]
    fn test_payload() {
        let framed = frame(b"abc");
        assert_eq!(framed.len(), 3 + FRAMING_OVERHEAD);
        assert_eq!(payload(&framed), Ok(&b"abc"[..]));
        assert_eq!(payload_range(&framed), Ok(4..7));

        let empty = frame(b"");
        assert_eq!(payload(&empty), Ok(&b""[..]));
    }

    #[test]
    fn test_bad_magic() {
        let mut framed = frame(b"abc");
        let last = framed.len() - 1;
        framed[last] = b'X';
        let err = payload(&framed).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ContainerFormat);

        let mut framed = frame(b"abc");
        framed[0] = b'H';
        assert_eq!(
            payload(&framed).unwrap_err().category(),
            ErrorCategory::ContainerFormat
        );
    }

    #[test]
    fn test_truncated() {
        let framed = frame(b"abc");
        assert!(payload(&framed[..framed.len() - 4]).is_err());
        assert!(payload(&framed[..10]).is_err());
        assert!(payload(b"hist").is_err());
    }

    #[test]
    fn test_offset_out_of_range() {
        let mut framed = Vec::new();
        framed.extend_from_slice(&MAGIC);
        framed.extend_from_slice(b"abc");
        framed.extend_from_slice(&footer(100));
        assert!(payload(&framed).is_err());

        let mut framed = Vec::new();
        framed.extend_from_slice(&MAGIC);
        framed.extend_from_slice(&footer(0));
        assert!(payload(&framed).is_err());
    }
}
