//! Record buffer cursor.
//!
//! [`BufferHelper`] walks a record buffer with a fixed endian. Reads are
//! bounds-checked against `max` and never truncate; writes append to the
//! buffer and keep `max` in step with its length.

use serde::{Deserialize, Serialize};

use crate::{AdaError, Result};

// ── Endian ─────────────────────────────────────────────────────────

/// Byte order of binary fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    /// Least significant byte first.
    Little,
    /// Most significant byte first (high-order first).
    Big,
}

impl Endian {
    /// Endian of the running host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Little => f.write_str("little"),
            Self::Big => f.write_str("big"),
        }
    }
}

// ── BufferHelper ───────────────────────────────────────────────────

/// Bounds-checked cursor over a record buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHelper {
    buffer: Vec<u8>,
    offset: usize,
    max: usize,
    endian: Endian,
    search_mode: bool,
}

macro_rules! receive_int {
    ($name:ident, $ty:ty, $n:expr) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the configured endian.")]
        pub fn $name(&mut self) -> Result<$ty> {
            let endian = self.endian;
            let bytes = self.receive_bytes($n)?;
            let mut raw = [0u8; $n];
            raw.copy_from_slice(bytes);
            Ok(match endian {
                Endian::Little => <$ty>::from_le_bytes(raw),
                Endian::Big => <$ty>::from_be_bytes(raw),
            })
        }
    };
}

macro_rules! put_int {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Append a `", stringify!($ty), "` in the configured endian.")]
        pub fn $name(&mut self, value: $ty) {
            match self.endian {
                Endian::Little => self.put_bytes(&value.to_le_bytes()),
                Endian::Big => self.put_bytes(&value.to_be_bytes()),
            }
        }
    };
}

impl BufferHelper {
    /// Cursor over an existing buffer, positioned at the start.
    pub fn new(buffer: Vec<u8>, endian: Endian) -> Self {
        let max = buffer.len();
        Self {
            buffer,
            offset: 0,
            max,
            endian,
            search_mode: false,
        }
    }

    /// Empty buffer for writing.
    pub fn for_writing(endian: Endian) -> Self {
        Self::new(Vec::new(), endian)
    }

    /// Builder: mark the buffer as a search buffer.
    pub fn with_search_mode(mut self, search_mode: bool) -> Self {
        self.search_mode = search_mode;
        self
    }

    /// Whether the buffer carries search values.
    pub fn search_mode(&self) -> bool {
        self.search_mode
    }

    /// Configured endian.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Current cursor offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Buffer limit.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Bytes left between the cursor and the limit.
    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.offset)
    }

    /// Whether the cursor reached the limit.
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.max
    }

    /// Lower the limit to `len`; never raises it past the buffer length.
    pub fn shrink(&mut self, len: usize) {
        self.max = len.min(self.buffer.len());
        if self.offset > self.max {
            self.offset = self.max;
        }
    }

    /// Seek to an absolute offset.
    pub fn position(&mut self, offset: usize) -> Result<()> {
        if offset > self.max {
            return Err(AdaError::OffsetOutOfRange {
                offset,
                max: self.max,
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Underlying bytes.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the helper and return the bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Read `n` bytes and advance.
    pub fn receive_bytes(&mut self, n: usize) -> Result<&[u8]> {
        let end = self.offset.checked_add(n).filter(|end| *end <= self.max);
        match end {
            Some(end) => {
                let start = self.offset;
                self.offset = end;
                Ok(&self.buffer[start..end])
            }
            None => Err(AdaError::BufferOverflow {
                offset: self.offset,
                requested: n,
                max: self.max,
            }),
        }
    }

    /// Read `n` bytes as text, invalid UTF-8 replaced.
    pub fn receive_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.receive_bytes(n)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read one unsigned byte.
    pub fn receive_u8(&mut self) -> Result<u8> {
        Ok(self.receive_bytes(1)?[0])
    }

    /// Read one signed byte.
    pub fn receive_i8(&mut self) -> Result<i8> {
        Ok(self.receive_u8()? as i8)
    }

    receive_int!(receive_u16, u16, 2);
    receive_int!(receive_i16, i16, 2);
    receive_int!(receive_u32, u32, 4);
    receive_int!(receive_i32, i32, 4);
    receive_int!(receive_u64, u64, 8);
    receive_int!(receive_i64, i64, 8);
    receive_int!(receive_f32, f32, 4);
    receive_int!(receive_f64, f64, 8);

    /// Append raw bytes and move the cursor to the end.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buffer.truncate(self.max);
        self.buffer.extend_from_slice(bytes);
        self.max = self.buffer.len();
        self.offset = self.max;
    }

    /// Append text bytes.
    pub fn put_string(&mut self, text: &str) {
        self.put_bytes(text.as_bytes());
    }

    /// Append one unsigned byte.
    pub fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    /// Append one signed byte.
    pub fn put_i8(&mut self, value: i8) {
        self.put_bytes(&value.to_le_bytes());
    }

    put_int!(put_u16, u16);
    put_int!(put_i16, i16);
    put_int!(put_u32, u32);
    put_int!(put_i32, i32);
    put_int!(put_u64, u64);
    put_int!(put_i64, i64);
    put_int!(put_f32, f32);
    put_int!(put_f64, f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_little_endian() {
        let mut helper = BufferHelper::new(vec![1, 0, 0, 0, 2, 0, 0xff], Endian::Little);
        assert_eq!(helper.receive_u32().unwrap(), 1);
        assert_eq!(helper.receive_u16().unwrap(), 2);
        assert_eq!(helper.receive_i8().unwrap(), -1);
        assert!(helper.is_at_end());
    }

    #[test]
    fn test_receive_big_endian() {
        let mut helper = BufferHelper::new(vec![0, 0, 1, 2], Endian::Big);
        assert_eq!(helper.receive_i32().unwrap(), 258);
    }

    #[test]
    fn test_overflow_does_not_advance() {
        let mut helper = BufferHelper::new(vec![1, 2, 3], Endian::Little);
        assert!(matches!(
            helper.receive_u32(),
            Err(AdaError::BufferOverflow { offset: 0, requested: 4, max: 3 })
        ));
        assert_eq!(helper.offset(), 0);
        assert_eq!(helper.receive_bytes(3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_position_and_remaining() {
        let mut helper = BufferHelper::new(vec![0; 10], Endian::Little);
        helper.position(8).unwrap();
        assert_eq!(helper.remaining(), 2);
        assert!(matches!(
            helper.position(11),
            Err(AdaError::OffsetOutOfRange { offset: 11, max: 10 })
        ));
        helper.shrink(4);
        assert_eq!(helper.remaining(), 0);
        assert_eq!(helper.max(), 4);
    }

    #[test]
    fn test_put_appends() {
        let mut helper = BufferHelper::for_writing(Endian::Little);
        helper.put_u32(5);
        helper.put_string("AB");
        helper.put_i16(-2);
        assert_eq!(helper.buffer(), &[5, 0, 0, 0, b'A', b'B', 0xfe, 0xff]);
        assert_eq!(helper.offset(), 8);
    }

    #[test]
    fn test_float_round_trip() {
        let mut helper = BufferHelper::for_writing(Endian::Big);
        helper.put_f64(1.5);
        let mut reader = BufferHelper::new(helper.into_inner(), Endian::Big);
        assert_eq!(reader.receive_f64().unwrap(), 1.5);
    }
}
