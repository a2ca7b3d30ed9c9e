//! Super descriptor and redefinition payloads.

use std::sync::Arc;

use crate::fdt::{AdaType, TypeDetail};
use crate::{AdaError, Result};

use super::{FieldData, FieldValue};

/// Empty redefinition payload with one value per sub field.
pub(super) fn new_redefinition(ty: &AdaType) -> Result<FieldData> {
    let TypeDetail::Redefinition { fields, .. } = ty.detail() else {
        return Err(AdaError::UnsupportedKind {
            kind: ty.kind().name().to_string(),
            name: ty.name().to_string(),
        });
    };
    let fields = fields
        .iter()
        .map(|f| FieldValue::new(Arc::new(f.clone())))
        .collect::<Result<Vec<_>>>()?;
    let mut data = FieldData::Redefinition {
        main: vec![0; ty.length() as usize],
        fields,
    };
    if let FieldData::Redefinition { main, fields } = &mut data {
        *main = join(fields)?;
    }
    Ok(data)
}

fn join(fields: &[FieldValue]) -> Result<Vec<u8>> {
    let mut main = Vec::new();
    for field in fields {
        let mut bytes = field.bytes()?;
        bytes.resize(field.ty().length() as usize, 0);
        main.extend(bytes);
    }
    Ok(main)
}

/// Split main field bytes over the sub fields.
pub(super) fn set_redefinition_bytes(value: &mut FieldValue, bytes: &[u8]) -> Result<()> {
    let length = value.ty().length() as usize;
    if bytes.len() != length {
        return Err(AdaError::LengthMismatch {
            length: bytes.len(),
            name: value.name().to_string(),
        });
    }
    if let FieldData::Redefinition { main, fields } = value.data_mut() {
        let mut offset = 0;
        for field in fields.iter_mut() {
            let width = field.ty().length() as usize;
            field.set_bytes(&bytes[offset..offset + width])?;
            offset += width;
        }
        *main = bytes.to_vec();
    }
    Ok(())
}

impl FieldValue {
    /// Assign text to sub field `name` of a redefinition and rebuild the main bytes.
    pub fn set_redefinition_field(&mut self, name: &str, text: &str) -> Result<()> {
        let field_name = self.name().to_string();
        let FieldData::Redefinition { main, fields } = self.data_mut() else {
            return Err(AdaError::TypeMismatch {
                input: "redefinition".to_string(),
                name: field_name,
            });
        };
        let Some(field) = fields.iter_mut().find(|f| f.name() == name) else {
            return Err(AdaError::FieldNotFound {
                name: name.to_string(),
            });
        };
        field.set_string(text)?;
        *main = join(fields)?;
        Ok(())
    }
}

/// Render each descriptor slice: alpha parents as text, others as hex.
pub(super) fn super_desc_string(ty: &AdaType, bytes: &[u8]) -> String {
    let TypeDetail::SuperDesc { entries } = ty.detail() else {
        return hex(bytes);
    };
    let mut offset = 0;
    let mut parts = Vec::with_capacity(entries.len());
    for entry in entries {
        let end = (offset + entry.width() as usize).min(bytes.len());
        let slice = &bytes[offset.min(end)..end];
        let part = match entry.kind {
            Some(kind) if kind.is_alpha() => String::from_utf8_lossy(slice).trim_end().to_string(),
            _ => hex(slice),
        };
        parts.push(part);
        offset = end;
    }
    parts.join(",")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdt::SuperEntry;
    use crate::kind::FieldKind;

    #[test]
    fn test_redefinition_split() {
        let main = AdaType::with_length(FieldKind::String, "AB", 6);
        let fields = vec![
            AdaType::with_length(FieldKind::String, "R1", 2),
            AdaType::with_length(FieldKind::String, "R2", 4),
        ];
        let ty = AdaType::redefinition(main, fields).unwrap();
        let mut v = FieldValue::new(Arc::new(ty)).unwrap();
        v.set_bytes(b"xyABCD").unwrap();
        assert_eq!(v.redefinition_fields()[0].string(), "xy");
        assert_eq!(v.redefinition_fields()[1].string(), "ABCD");
        v.set_redefinition_field("R1", "zz").unwrap();
        assert_eq!(v.bytes().unwrap(), b"zzABCD".to_vec());
        assert_eq!(v.string(), "zz,ABCD");
    }

    #[test]
    fn test_super_desc_string() {
        let mut a = SuperEntry::new("AA", 1, 3);
        a.kind = Some(FieldKind::String);
        let b = SuperEntry::new("AB", 1, 2);
        let ty = AdaType::super_desc("S1", vec![a, b]);
        assert_eq!(super_desc_string(&ty, b"ab \x01\x02"), "ab,0102");
    }
}
