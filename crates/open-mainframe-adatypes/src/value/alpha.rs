//! Alpha, wide and byte array payloads.

use crate::{AdaError, Result};

use super::{FieldData, FieldValue};

/// Fit `bytes` to a fixed length, padding with `fill`.
fn fit(mut bytes: Vec<u8>, length: usize, fill: u8) -> Vec<u8> {
    if length > 0 {
        bytes.resize(length, fill);
    }
    bytes
}

/// Assign text through the field's charset.
pub(super) fn set_text(value: &mut FieldValue, text: &str) {
    let charset = value.ty().charset().unwrap_or_default();
    let wire = charset.encode(text);
    set_wire_bytes(value, &wire);
}

/// Assign wire bytes; fixed length fields truncate or blank pad.
pub(super) fn set_wire_bytes(value: &mut FieldValue, wire: &[u8]) {
    let length = value.ty().length() as usize;
    let blank = value.ty().charset().unwrap_or_default().blank();
    let bytes = fit(wire.to_vec(), length, blank);
    let lob_size = bytes.len() as u32;
    *value.data_mut() = FieldData::Alpha { bytes, lob_size };
}

/// Append the remainder of a LOB received in a second call.
pub(crate) fn append_lob(value: &mut FieldValue, chunk: &[u8]) {
    if let FieldData::Alpha { bytes, .. } = value.data_mut() {
        bytes.extend_from_slice(chunk);
    }
}

/// Assign a byte array; fixed length fields zero pad but never truncate.
pub(super) fn set_byte_array(value: &mut FieldValue, wire: &[u8]) -> Result<()> {
    let length = value.ty().length() as usize;
    if length > 0 && wire.len() > length {
        return Err(AdaError::LengthMismatch {
            length: wire.len(),
            name: value.name().to_string(),
        });
    }
    *value.data_mut() = FieldData::Bytes(fit(wire.to_vec(), length, 0));
    Ok(())
}
