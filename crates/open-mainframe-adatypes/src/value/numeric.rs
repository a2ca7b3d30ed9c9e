//! Binary integer and float encodings.
//!
//! Fixed width fields use the field or buffer byte order. Variable length
//! integers (length 0) always carry a little-endian payload.

use crate::buffer::Endian;
use crate::kind::FieldKind;
use crate::{AdaError, Result};

use super::{FieldData, FieldValue};

/// Unsigned integer from up to eight bytes.
pub(super) fn read_unsigned(bytes: &[u8], endian: Endian) -> u64 {
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    match endian {
        Endian::Big => bytes.iter().fold(0, fold),
        Endian::Little => bytes.iter().rev().fold(0, fold),
    }
}

fn read_signed(bytes: &[u8], endian: Endian) -> i64 {
    let raw = read_unsigned(bytes, endian);
    let bits = 8 * bytes.len() as u32;
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

fn ordered(mut le: Vec<u8>, endian: Endian) -> Vec<u8> {
    if endian == Endian::Big {
        le.reverse();
    }
    le
}

/// Checked unsigned decode for length fields.
pub(super) fn decode_unsigned(value: &FieldValue, bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(AdaError::LengthMismatch {
            length: bytes.len(),
            name: value.name().to_string(),
        });
    }
    Ok(read_unsigned(bytes, value.ty().endian()))
}

/// Smallest payload width for a variable length integer.
fn variable_width(kind: FieldKind, data: &FieldData) -> usize {
    let needed = match data {
        FieldData::Unsigned(v) => (1..=8).find(|n| *n == 8 || *v < 1u64 << (8 * n)),
        FieldData::Signed(v) => (1..=8).find(|n| {
            let bound = 1i128 << (8 * n - 1);
            *n == 8 || (i128::from(*v) >= -bound && i128::from(*v) < bound)
        }),
        _ => Some(8),
    }
    .unwrap_or(8);
    match kind {
        FieldKind::UInt8 | FieldKind::Int8 => match needed {
            1 => 1,
            2 => 2,
            3 | 4 => 4,
            _ => 8,
        },
        _ => needed.min(4),
    }
}

/// Encoding in the field's own byte order.
pub(super) fn encode(value: &FieldValue) -> Result<Vec<u8>> {
    encode_with(value, value.ty().endian())
}

/// Encoding in `endian`; variable length payloads stay little-endian.
pub(super) fn encode_with(value: &FieldValue, endian: Endian) -> Result<Vec<u8>> {
    let ty = value.ty();
    let (width, endian) = match ty.length() {
        0 => (variable_width(ty.kind(), value.data()), Endian::Little),
        n => (n as usize, endian),
    };
    let bytes = match value.data() {
        FieldData::Float(v) => match width {
            4 => (*v as f32).to_le_bytes().to_vec(),
            8 => v.to_le_bytes().to_vec(),
            _ => {
                return Err(AdaError::InvalidFloatLength {
                    length: ty.length(),
                    name: ty.name().to_string(),
                })
            }
        },
        FieldData::Unsigned(v) => {
            let mut le = v.to_le_bytes().to_vec();
            le.resize(width, 0);
            le
        }
        FieldData::Signed(v) => {
            let fill = if *v < 0 { 0xFF } else { 0 };
            let mut le = v.to_le_bytes().to_vec();
            le.resize(width, fill);
            le
        }
        _ => {
            return Err(AdaError::TypeMismatch {
                input: "binary".to_string(),
                name: ty.name().to_string(),
            })
        }
    };
    Ok(ordered(bytes, endian))
}

/// Assign from wire bytes in the field's own byte order.
pub(super) fn set_wire_bytes(value: &mut FieldValue, bytes: &[u8]) -> Result<()> {
    let endian = value.ty().endian();
    decode_into(value, bytes, endian)
}

/// Assign from wire bytes in `endian`.
pub(super) fn decode_into(value: &mut FieldValue, bytes: &[u8], endian: Endian) -> Result<()> {
    let length = value.ty().length() as usize;
    let variable = length == 0;
    if bytes.is_empty() || bytes.len() > 8 || (!variable && bytes.len() != length) {
        return Err(AdaError::LengthMismatch {
            length: bytes.len(),
            name: value.name().to_string(),
        });
    }
    let endian = if variable { Endian::Little } else { endian };
    let name = value.name().to_string();
    match value.data_mut() {
        FieldData::Float(v) => {
            let raw = read_unsigned(bytes, endian);
            *v = match bytes.len() {
                4 => f64::from(f32::from_bits(raw as u32)),
                8 => f64::from_bits(raw),
                length => {
                    return Err(AdaError::InvalidFloatLength {
                        length: length as u32,
                        name,
                    })
                }
            };
        }
        FieldData::Unsigned(v) => *v = read_unsigned(bytes, endian),
        FieldData::Signed(v) => *v = read_signed(bytes, endian),
        _ => {
            return Err(AdaError::TypeMismatch {
                input: "binary".to_string(),
                name,
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fdt::AdaType;

    fn value(kind: FieldKind, length: u32) -> FieldValue {
        FieldValue::new(Arc::new(
            AdaType::with_length(kind, "XX", length).with_endian(Endian::Little),
        ))
        .unwrap()
    }

    #[test]
    fn test_variable_signed_payload() {
        let mut v = value(FieldKind::Int4, 0);
        decode_into(&mut v, &[0xFF], Endian::Big).unwrap();
        assert_eq!(v.get_i64().unwrap(), -1);
        decode_into(&mut v, &[0x01, 0x01], Endian::Big).unwrap();
        assert_eq!(v.get_i64().unwrap(), 257);
        decode_into(&mut v, &[0x01, 0x01, 0x01], Endian::Big).unwrap();
        assert_eq!(v.get_i64().unwrap(), 65793);
    }

    #[test]
    fn test_variable_width_selection() {
        let mut v = value(FieldKind::Int8, 0);
        v.set_i64(70_000).unwrap();
        assert_eq!(encode(&v).unwrap().len(), 4);
        v.set_i64(-1).unwrap();
        assert_eq!(encode(&v).unwrap(), vec![0xFF]);
        let mut u = value(FieldKind::UInt4, 0);
        u.set_u64(65793).unwrap();
        assert_eq!(encode(&u).unwrap(), vec![0x01, 0x01, 0x01]);
    }

    #[test]
    fn test_fixed_big_endian() {
        let mut v = FieldValue::new(Arc::new(
            AdaType::new(FieldKind::UInt4, "U4").with_endian(Endian::Big),
        ))
        .unwrap();
        v.set_u64(0x0102_0304).unwrap();
        assert_eq!(encode(&v).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(encode_with(&v, Endian::Little).unwrap(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_fixed_length_mismatch() {
        let mut v = value(FieldKind::Int2, 2);
        let err = decode_into(&mut v, &[1, 2, 3], Endian::Little).unwrap_err();
        assert_eq!(err.code(), 104);
    }
}
