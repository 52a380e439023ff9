//! Low-level save-stream framing: length-delimited sections and marker
//! bytes.
//!
//! A section is a 4-byte big-endian length prefix followed by that many
//! payload bytes. A marker is a single tag byte separating the delegate
//! records from each other and from the end of the stream. The size cap
//! protects against unbounded allocation from a corrupt or malicious
//! length prefix — the length field is attacker-controlled input once a
//! save file leaves the machine that wrote it.

use std::io::{Read, Write};

use crate::SaveError;

/// Maximum allowed section size (64 MB). State snapshots are the
/// largest expected sections; 64 MB is generous headroom.
pub const MAX_SECTION_SIZE: u32 = 64 * 1024 * 1024;

/// Marker: a delegate record follows.
pub const MARKER_DELEGATE_START: u8 = 0xD1;

/// Marker: the delegate header is done, the opaque state blob follows.
pub const MARKER_DELEGATE_DATA: u8 = 0xD2;

/// Marker: no more delegate records.
pub const MARKER_END: u8 = 0xD9;

/// Writes one length-delimited section.
pub fn write_section<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), SaveError> {
    let len = payload.len();
    if len > MAX_SECTION_SIZE as usize {
        return Err(SaveError::CorruptSave(format!(
            "section of {len} bytes exceeds the {MAX_SECTION_SIZE}-byte cap"
        )));
    }
    writer.write_all(&(len as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Reads one length-delimited section.
pub fn read_section<R: Read>(reader: &mut R) -> Result<Vec<u8>, SaveError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_SECTION_SIZE {
        return Err(SaveError::CorruptSave(format!(
            "section length {len} exceeds the {MAX_SECTION_SIZE}-byte cap"
        )));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Writes one marker byte.
pub fn write_marker<W: Write>(writer: &mut W, marker: u8) -> Result<(), SaveError> {
    writer.write_all(&[marker])?;
    Ok(())
}

/// Reads one marker byte.
pub fn read_marker<R: Read>(reader: &mut R) -> Result<u8, SaveError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads one marker byte and fails with [`SaveError::CorruptSave`] if
/// it isn't the expected one.
pub fn expect_marker<R: Read>(reader: &mut R, expected: u8) -> Result<(), SaveError> {
    let got = read_marker(reader)?;
    if got != expected {
        return Err(SaveError::CorruptSave(format!(
            "expected marker {expected:#04x}, found {got:#04x}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_section_round_trip() {
        let mut buf = Vec::new();
        write_section(&mut buf, b"delegate state").unwrap();
        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_section(&mut cursor).unwrap(), b"delegate state");
    }

    #[test]
    fn test_empty_section_round_trip() {
        let mut buf = Vec::new();
        write_section(&mut buf, b"").unwrap();
        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_section(&mut cursor).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let mut buf = (MAX_SECTION_SIZE + 1).to_be_bytes().to_vec();
        buf.extend_from_slice(b"whatever");
        let mut cursor = Cursor::new(&buf);
        let err = read_section(&mut cursor).unwrap_err();
        assert!(matches!(err, SaveError::CorruptSave(_)));
    }

    #[test]
    fn test_truncated_section_is_io_error() {
        let mut buf = Vec::new();
        write_section(&mut buf, b"full payload").unwrap();
        buf.truncate(buf.len() - 3);
        let mut cursor = Cursor::new(&buf);
        let err = read_section(&mut cursor).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }

    #[test]
    fn test_expect_marker_mismatch_is_corrupt_save() {
        let mut cursor = Cursor::new(vec![MARKER_DELEGATE_DATA]);
        let err = expect_marker(&mut cursor, MARKER_DELEGATE_START).unwrap_err();
        assert!(matches!(err, SaveError::CorruptSave(_)));
    }

    #[test]
    fn test_markers_are_distinct() {
        assert_ne!(MARKER_DELEGATE_START, MARKER_DELEGATE_DATA);
        assert_ne!(MARKER_DELEGATE_START, MARKER_END);
        assert_ne!(MARKER_DELEGATE_DATA, MARKER_END);
    }
}
