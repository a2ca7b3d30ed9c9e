//! Packed (BCD) and unpacked (zoned) decimal encodings.

use crate::fdt::AdaType;
use crate::kind::FieldKind;
use crate::{AdaError, Result};

use super::{FieldData, FieldValue};

/// Largest wire length of a variable length decimal.
const MAX_DECIMAL_LENGTH: u32 = 15;

fn digits(ty: &AdaType) -> u32 {
    let length = match ty.length() {
        0 => MAX_DECIMAL_LENGTH,
        n => n,
    };
    match ty.kind() {
        FieldKind::Unpacked => length,
        _ => length * 2 - 1,
    }
}

/// Whether the scaled value fits the field's digit count.
pub(super) fn fits(ty: &AdaType, scaled: i128) -> bool {
    match 10i128.checked_pow(digits(ty)) {
        Some(limit) => scaled.unsigned_abs() < limit.unsigned_abs(),
        None => true,
    }
}

/// Wire encoding of a scaled decimal.
pub(super) fn encode(ty: &AdaType, scaled: i128) -> Result<Vec<u8>> {
    if !fits(ty, scaled) {
        return Err(AdaError::RangeOverflow {
            name: ty.name().to_string(),
            value: format_scaled(scaled, ty.fractional()),
            length: ty.length(),
        });
    }
    let digit_count = scaled.unsigned_abs().to_string().len() as u32;
    Ok(match ty.kind() {
        FieldKind::Unpacked => {
            let length = match ty.length() {
                0 => digit_count,
                n => n,
            };
            encode_unpacked(scaled, length as usize)
        }
        _ => {
            let length = match ty.length() {
                0 => digit_count / 2 + 1,
                n => n,
            };
            encode_packed(scaled, length as usize)
        }
    })
}

/// BCD nibbles with a trailing `C` or `D` sign.
pub(crate) fn encode_packed(value: i128, length: usize) -> Vec<u8> {
    let text = format!("{:0>width$}", value.unsigned_abs(), width = length * 2 - 1);
    let mut nibbles: Vec<u8> = text.bytes().map(|b| b - b'0').collect();
    nibbles.push(if value < 0 { 0x0D } else { 0x0C });
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

/// Zoned digits `0x30|d`; a negative value marks the last byte `0x70|d`.
pub(crate) fn encode_unpacked(value: i128, length: usize) -> Vec<u8> {
    let text = format!("{:0>width$}", value.unsigned_abs(), width = length);
    let mut bytes: Vec<u8> = text.bytes().map(|b| 0x30 | (b - b'0')).collect();
    if value < 0 {
        if let Some(last) = bytes.last_mut() {
            *last = 0x70 | (*last & 0x0F);
        }
    }
    bytes
}

/// Decode BCD; `B` and `D` sign nibbles are negative.
pub(crate) fn decode_packed(bytes: &[u8]) -> Option<i128> {
    let (last, body) = bytes.split_last()?;
    let mut value: i128 = 0;
    let mut push = |digit: u8| -> Option<()> {
        if digit > 9 {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(i128::from(digit))?;
        Some(())
    };
    for b in body {
        push(b >> 4)?;
        push(b & 0x0F)?;
    }
    push(last >> 4)?;
    match last & 0x0F {
        0x0B | 0x0D => Some(-value),
        0x0A | 0x0C | 0x0E | 0x0F => Some(value),
        _ => None,
    }
}

/// Decode zoned digits in ASCII (`3x`/`7x`) or EBCDIC (`Fx`/`Dx`) zones.
pub(crate) fn decode_unpacked(bytes: &[u8]) -> Option<i128> {
    let (last, _) = bytes.split_last()?;
    let mut value: i128 = 0;
    for b in bytes {
        let digit = b & 0x0F;
        if digit > 9 {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(i128::from(digit))?;
    }
    match last >> 4 {
        0x7 | 0xD | 0xB => Some(-value),
        _ => Some(value),
    }
}

/// Scaled integer as text with `fractional` decimal places.
pub(super) fn format_scaled(value: i128, fractional: u32) -> String {
    if fractional == 0 {
        return value.to_string();
    }
    let width = fractional as usize + 1;
    let digits = format!("{:0>width$}", value.unsigned_abs());
    let (int, frac) = digits.split_at(digits.len() - fractional as usize);
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{int}.{frac}")
}

/// Assign from wire bytes.
pub(super) fn set_wire_bytes(value: &mut FieldValue, bytes: &[u8]) -> Result<()> {
    let length = value.ty().length() as usize;
    if bytes.is_empty() || (length != 0 && bytes.len() != length) {
        return Err(AdaError::LengthMismatch {
            length: bytes.len(),
            name: value.name().to_string(),
        });
    }
    let decoded = match value.ty().kind() {
        FieldKind::Unpacked => decode_unpacked(bytes),
        _ => decode_packed(bytes),
    };
    let Some(decoded) = decoded else {
        return Err(AdaError::InvalidNumber {
            name: value.name().to_string(),
            value: bytes.iter().map(|b| format!("{b:02X}")).collect(),
        });
    };
    *value.data_mut() = FieldData::Decimal(decoded);
    Ok(())
}
