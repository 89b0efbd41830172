//! Record codec for fixed-size log blocks.
//!
//! A record is laid out as `header + data + padding`, where the header is
//! `(data_length: u16, empty_length: u16)`, both little-endian. The padding
//! lets a later logical delete or overwrite shrink the data in place without
//! shifting the records that follow it.
//!
//! Four zero bytes where a header would be is the end-of-block marker: no
//! valid record has both length fields zero. A record with `data_length == 0`
//! and `empty_length > 0` is a tombstone and reads as "not present".
//!
//! All functions here are pure and stateless; callers guarantee that offsets
//! lie within block bounds.

/// Size of the record header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Size of the end-of-block marker in bytes.
pub const EOB_SIZE: usize = 4;

/// A decoded view of one record inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordView<'a> {
    /// The record data (empty for tombstones).
    pub data: &'a [u8],
    /// Declared data length.
    pub data_len: usize,
    /// Declared padding length.
    pub empty_len: usize,
    /// Total slot size: header + data + padding.
    pub size: usize,
}

impl RecordView<'_> {
    /// Returns whether this record is a tombstone.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data_len == 0 && self.empty_len > 0
    }
}

/// Returns the encoded slot size for `data_len` bytes of data (no padding).
#[must_use]
pub const fn encoded_size(data_len: usize) -> usize {
    HEADER_SIZE + data_len
}

/// Reads the `(data_length, empty_length)` header at `offset` without
/// touching the data bytes. Lets callers bounds-check a suspect offset
/// before slicing.
#[must_use]
pub fn lengths(block: &[u8], offset: usize) -> (usize, usize) {
    let data_len = u16::from_le_bytes([block[offset], block[offset + 1]]) as usize;
    let empty_len = u16::from_le_bytes([block[offset + 2], block[offset + 3]]) as usize;
    (data_len, empty_len)
}

/// Reads the record starting at `offset`.
#[must_use]
pub fn read(block: &[u8], offset: usize) -> RecordView<'_> {
    let data_len = u16::from_le_bytes([block[offset], block[offset + 1]]) as usize;
    let empty_len = u16::from_le_bytes([block[offset + 2], block[offset + 3]]) as usize;
    let data = &block[offset + HEADER_SIZE..offset + HEADER_SIZE + data_len];
    RecordView {
        data,
        data_len,
        empty_len,
        size: HEADER_SIZE + data_len + empty_len,
    }
}

/// Writes a record at `offset` with `padding` trailing empty bytes.
///
/// Returns the total slot size written.
pub fn write(block: &mut [u8], offset: usize, data: &[u8], padding: usize) -> usize {
    let data_len = data.len() as u16;
    let empty_len = padding as u16;
    block[offset..offset + 2].copy_from_slice(&data_len.to_le_bytes());
    block[offset + 2..offset + 4].copy_from_slice(&empty_len.to_le_bytes());
    block[offset + HEADER_SIZE..offset + HEADER_SIZE + data.len()].copy_from_slice(data);
    let pad_start = offset + HEADER_SIZE + data.len();
    block[pad_start..pad_start + padding].fill(0);
    HEADER_SIZE + data.len() + padding
}

/// Replaces the data of an existing record, keeping the total slot size fixed.
///
/// The caller must ensure `data` fits within the existing
/// `data_len + empty_len` capacity; the freed tail becomes padding.
pub fn overwrite(block: &mut [u8], offset: usize, data: &[u8]) {
    let existing = read(block, offset);
    let capacity = existing.data_len + existing.empty_len;
    let padding = capacity - data.len();
    write(block, offset, data, padding);
}

/// Converts the record at `offset` into a tombstone of equal total size.
pub fn overwrite_as_empty(block: &mut [u8], offset: usize) {
    let existing = read(block, offset);
    let capacity = existing.data_len + existing.empty_len;
    write(block, offset, &[], capacity);
}

/// Returns whether `offset` holds the end-of-block marker.
#[must_use]
pub fn is_eob(block: &[u8], offset: usize) -> bool {
    offset + EOB_SIZE > block.len() || block[offset..offset + EOB_SIZE] == [0, 0, 0, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_roundtrip() {
        let mut block = vec![0u8; 64];
        let size = write(&mut block, 0, b"hello", 0);
        assert_eq!(size, HEADER_SIZE + 5);

        let rec = read(&block, 0);
        assert_eq!(rec.data, b"hello");
        assert_eq!(rec.data_len, 5);
        assert_eq!(rec.empty_len, 0);
        assert_eq!(rec.size, size);
        assert!(!rec.is_empty());
    }

    #[test]
    fn padding_included_in_slot_size() {
        let mut block = vec![0u8; 64];
        let size = write(&mut block, 0, b"ab", 6);
        assert_eq!(size, HEADER_SIZE + 2 + 6);

        let rec = read(&block, 0);
        assert_eq!(rec.data, b"ab");
        assert_eq!(rec.empty_len, 6);
        assert_eq!(rec.size, size);
    }

    #[test]
    fn overwrite_keeps_slot_size() {
        let mut block = vec![0u8; 64];
        let size = write(&mut block, 0, b"long payload", 4);

        overwrite(&mut block, 0, b"tiny");
        let rec = read(&block, 0);
        assert_eq!(rec.data, b"tiny");
        assert_eq!(rec.size, size);
    }

    #[test]
    fn tombstone_preserves_slot_size() {
        let mut block = vec![0u8; 64];
        let size = write(&mut block, 0, b"doomed", 2);

        overwrite_as_empty(&mut block, 0);
        let rec = read(&block, 0);
        assert!(rec.is_empty());
        assert_eq!(rec.data_len, 0);
        assert_eq!(rec.size, size);

        // Content is physically zeroed.
        assert!(block[HEADER_SIZE..size].iter().all(|&b| b == 0));
    }

    #[test]
    fn tombstone_distinct_from_eob() {
        let mut block = vec![0u8; 64];
        write(&mut block, 0, b"x", 0);
        overwrite_as_empty(&mut block, 0);

        // Tombstone header is (0, 1): not the all-zero marker.
        assert!(!is_eob(&block, 0));
        // Past the record lies zero-fill: that is EOB.
        assert!(is_eob(&block, HEADER_SIZE + 1));
    }

    #[test]
    fn eob_at_block_boundary() {
        let block = vec![1u8; 8];
        // Not enough room for a header counts as end-of-block.
        assert!(is_eob(&block, 6));
    }

    #[test]
    fn records_pack_contiguously() {
        let mut block = vec![0u8; 64];
        let first = write(&mut block, 0, b"one", 0);
        let second = write(&mut block, first, b"two", 0);

        assert_eq!(read(&block, 0).data, b"one");
        assert_eq!(read(&block, first).data, b"two");
        assert!(is_eob(&block, first + second));
    }
}
