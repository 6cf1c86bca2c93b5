use bytes::{Buf, Bytes};

use crate::codec;
use crate::error::DecodeError;

/// Sequential cursor over a received payload.
///
/// Each read advances past exactly the wire width of the value it decodes.
/// A failed read leaves the cursor where it was. There is no seeking back;
/// a reader is single-pass.
#[derive(Debug, Clone)]
pub struct MessageReader {
    data: Bytes,
}

impl MessageReader {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    fn read<T>(
        &mut self,
        decode: impl FnOnce(&mut Bytes) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        // Decode on a cheap clone so a failed read does not move the cursor.
        let mut probe = self.data.clone();
        let value = decode(&mut probe)?;
        self.data = probe;
        Ok(value)
    }

    pub fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        self.read(codec::get_bool)
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        self.read(codec::get_str)
    }

    pub fn read_char(&mut self) -> Result<char, DecodeError> {
        self.read(codec::get_char)
    }

    pub fn read_byte(&mut self) -> Result<i8, DecodeError> {
        self.read(codec::get_i8)
    }

    pub fn read_short(&mut self) -> Result<i16, DecodeError> {
        self.read(codec::get_i16)
    }

    pub fn read_int(&mut self) -> Result<i32, DecodeError> {
        self.read(codec::get_i32)
    }

    pub fn read_long(&mut self) -> Result<i64, DecodeError> {
        self.read(codec::get_i64)
    }

    pub fn read_float(&mut self) -> Result<f32, DecodeError> {
        self.read(codec::get_f32)
    }

    pub fn read_double(&mut self) -> Result<f64, DecodeError> {
        self.read(codec::get_f64)
    }

    /// Read exactly `len` raw bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        let remaining = self.data.len();
        if remaining < len {
            return Err(DecodeError::Underflow {
                needed: len,
                remaining,
            });
        }
        Ok(self.data.split_to(len))
    }

    /// Take every unread byte. The reader is empty afterwards.
    pub fn read_all(&mut self) -> Bytes {
        self.data.split_off(0)
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::*;

    fn payload() -> Bytes {
        let mut buf = BytesMut::new();
        codec::put_bool(&mut buf, true);
        codec::put_str(&mut buf, "pos").unwrap();
        codec::put_char(&mut buf, 'z').unwrap();
        codec::put_i8(&mut buf, -3);
        codec::put_i16(&mut buf, 300);
        codec::put_i32(&mut buf, -70_000);
        codec::put_i64(&mut buf, 1 << 40);
        codec::put_f32(&mut buf, 0.25);
        codec::put_f64(&mut buf, -8.5);
        buf.put_slice(&[9, 8, 7]);
        buf.freeze()
    }

    #[test]
    fn reads_values_in_order() {
        let mut reader = MessageReader::new(payload());

        assert!(reader.read_boolean().unwrap());
        assert_eq!(reader.read_string().unwrap(), "pos");
        assert_eq!(reader.read_char().unwrap(), 'z');
        assert_eq!(reader.read_byte().unwrap(), -3);
        assert_eq!(reader.read_short().unwrap(), 300);
        assert_eq!(reader.read_int().unwrap(), -70_000);
        assert_eq!(reader.read_long().unwrap(), 1 << 40);
        assert_eq!(reader.read_float().unwrap(), 0.25);
        assert_eq!(reader.read_double().unwrap(), -8.5);
        assert_eq!(reader.read_raw(2).unwrap().as_ref(), &[9, 8]);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_all().as_ref(), &[7]);
        assert!(reader.is_empty());
    }

    #[test]
    fn reading_past_end_underflows() {
        let mut reader = MessageReader::new(Bytes::from_static(&[0, 0, 0, 5, 1]));

        assert_eq!(reader.read_int().unwrap(), 5);
        assert_eq!(
            reader.read_int(),
            Err(DecodeError::Underflow {
                needed: 4,
                remaining: 1
            })
        );
        assert_eq!(reader.read_byte().unwrap(), 1);
        assert!(matches!(
            reader.read_byte(),
            Err(DecodeError::Underflow { .. })
        ));
    }

    #[test]
    fn failed_read_keeps_cursor() {
        // Length prefix says 10 bytes but only 2 follow.
        let mut reader = MessageReader::new(Bytes::from_static(&[0, 10, b'h', b'i']));

        assert!(reader.read_string().is_err());
        assert_eq!(reader.remaining(), 4);
        assert_eq!(reader.read_short().unwrap(), 10);
    }

    #[test]
    fn read_raw_underflow() {
        let mut reader = MessageReader::new(Bytes::from_static(b"abc"));
        assert_eq!(
            reader.read_raw(4),
            Err(DecodeError::Underflow {
                needed: 4,
                remaining: 3
            })
        );
        assert_eq!(reader.read_raw(3).unwrap().as_ref(), b"abc");
    }

    #[test]
    fn read_all_on_empty_payload() {
        let mut reader = MessageReader::new(Bytes::new());
        assert!(reader.read_all().is_empty());
        assert!(reader.read_boolean().is_err());
    }

    #[test]
    fn clones_read_independently() {
        let first = MessageReader::new(payload());
        let mut second = first.clone();

        assert!(second.read_boolean().unwrap());
        assert_eq!(first.remaining(), payload().len());
        assert_eq!(second.remaining(), payload().len() - 1);
    }
}
