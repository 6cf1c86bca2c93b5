//! Big-endian value codec.
//!
//! Stateless encode/decode of the primitive values a payload may carry.
//! Integers are fixed width and signed, floats are IEEE 754 bit patterns,
//! booleans are one byte, characters are one 2-byte code unit and strings
//! are `[len:2][utf8 bytes]`.

use bytes::{Buf, BufMut};

use crate::error::{DecodeError, EncodeError};

/// Longest string a 2-byte length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

pub fn put_bool(dst: &mut impl BufMut, value: bool) {
    dst.put_u8(u8::from(value));
}

pub fn put_i8(dst: &mut impl BufMut, value: i8) {
    dst.put_i8(value);
}

pub fn put_i16(dst: &mut impl BufMut, value: i16) {
    dst.put_i16(value);
}

pub fn put_i32(dst: &mut impl BufMut, value: i32) {
    dst.put_i32(value);
}

pub fn put_i64(dst: &mut impl BufMut, value: i64) {
    dst.put_i64(value);
}

pub fn put_f32(dst: &mut impl BufMut, value: f32) {
    dst.put_u32(value.to_bits());
}

pub fn put_f64(dst: &mut impl BufMut, value: f64) {
    dst.put_u64(value.to_bits());
}

/// Encode a character as a single big-endian UTF-16 code unit.
pub fn put_char(dst: &mut impl BufMut, value: char) -> Result<(), EncodeError> {
    let unit = u16::try_from(u32::from(value)).map_err(|_| EncodeError::CharOutOfRange(value))?;
    dst.put_u16(unit);
    Ok(())
}

/// Encode a length-prefixed UTF-8 string.
pub fn put_str(dst: &mut impl BufMut, value: &str) -> Result<(), EncodeError> {
    let len = value.len();
    if len > MAX_STRING_LEN {
        return Err(EncodeError::StringTooLong {
            len,
            max: MAX_STRING_LEN,
        });
    }
    dst.put_u16(len as u16);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn ensure(src: &impl Buf, needed: usize) -> Result<(), DecodeError> {
    let remaining = src.remaining();
    if remaining < needed {
        return Err(DecodeError::Underflow { needed, remaining });
    }
    Ok(())
}

/// Any nonzero byte decodes as `true`.
pub fn get_bool(src: &mut impl Buf) -> Result<bool, DecodeError> {
    ensure(src, 1)?;
    Ok(src.get_u8() != 0)
}

pub fn get_i8(src: &mut impl Buf) -> Result<i8, DecodeError> {
    ensure(src, 1)?;
    Ok(src.get_i8())
}

pub fn get_i16(src: &mut impl Buf) -> Result<i16, DecodeError> {
    ensure(src, 2)?;
    Ok(src.get_i16())
}

pub fn get_i32(src: &mut impl Buf) -> Result<i32, DecodeError> {
    ensure(src, 4)?;
    Ok(src.get_i32())
}

pub fn get_i64(src: &mut impl Buf) -> Result<i64, DecodeError> {
    ensure(src, 8)?;
    Ok(src.get_i64())
}

pub fn get_f32(src: &mut impl Buf) -> Result<f32, DecodeError> {
    ensure(src, 4)?;
    Ok(f32::from_bits(src.get_u32()))
}

pub fn get_f64(src: &mut impl Buf) -> Result<f64, DecodeError> {
    ensure(src, 8)?;
    Ok(f64::from_bits(src.get_u64()))
}

pub fn get_char(src: &mut impl Buf) -> Result<char, DecodeError> {
    ensure(src, 2)?;
    let unit = src.get_u16();
    char::from_u32(u32::from(unit)).ok_or(DecodeError::InvalidChar(unit))
}

/// Decode a length-prefixed UTF-8 string.
pub fn get_str(src: &mut impl Buf) -> Result<String, DecodeError> {
    ensure(src, 2)?;
    let len = src.get_u16() as usize;
    ensure(src, len)?;

    let mut bytes = vec![0u8; len];
    src.copy_to_slice(&mut bytes);
    match String::from_utf8(bytes) {
        Ok(value) => Ok(value),
        Err(err) => Err(DecodeError::InvalidUtf8(err.utf8_error())),
    }
}
