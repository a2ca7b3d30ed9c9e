//! Record buffer reading and writing of leaf values.

use tracing::trace;

use crate::buffer::{BufferHelper, Endian};
use crate::kind::{FieldKind, FieldOptions};
use crate::parser::{BufferOption, SecondCall};
use crate::{AdaError, Result};

use super::{alpha, decimal, numeric, special, FieldData, FieldValue};

impl FieldValue {
    /// Byte order of fixed binary payloads in a record buffer.
    fn wire_endian(&self, helper: &BufferHelper) -> Endian {
        if self.ty().has_option(FieldOptions::HF) {
            Endian::Big
        } else {
            helper.endian()
        }
    }

    /// Payload behind a 1-byte length prefix that counts itself.
    fn receive_prefixed(&self, helper: &mut BufferHelper) -> Result<Vec<u8>> {
        let prefix = helper.receive_u8()?;
        if prefix == 0 {
            return Err(AdaError::ShortPayload {
                name: self.name().to_string(),
                prefix: u32::from(prefix),
            });
        }
        Ok(helper.receive_bytes(usize::from(prefix) - 1)?.to_vec())
    }

    /// Read this value at the helper's cursor.
    pub fn parse_buffer(&mut self, helper: &mut BufferHelper, option: &mut BufferOption) -> Result<()> {
        let length = self.ty().length() as usize;
        match self.data() {
            FieldData::Unsigned(_) | FieldData::Signed(_) | FieldData::Float(_) => {
                if length == 0 {
                    let payload = self.receive_prefixed(helper)?;
                    numeric::decode_into(self, &payload, Endian::Little)?;
                } else {
                    let endian = self.wire_endian(helper);
                    let bytes = helper.receive_bytes(length)?.to_vec();
                    numeric::decode_into(self, &bytes, endian)?;
                }
            }
            FieldData::Decimal(_) => {
                let bytes = if length == 0 {
                    self.receive_prefixed(helper)?
                } else {
                    helper.receive_bytes(length)?.to_vec()
                };
                decimal::set_wire_bytes(self, &bytes)?;
            }
            FieldData::Alpha { .. } => self.parse_alpha(helper, option)?,
            FieldData::Bytes(_) => {
                let bytes = if length == 0 {
                    self.receive_prefixed(helper)?
                } else {
                    helper.receive_bytes(length)?.to_vec()
                };
                *self.data_mut() = FieldData::Bytes(bytes);
            }
            FieldData::Length(_) => {
                let value = helper.receive_u32()?;
                *self.data_mut() = FieldData::Length(value);
            }
            FieldData::Filler(_) => {
                let bytes = helper.receive_bytes(length)?.to_vec();
                *self.data_mut() = FieldData::Filler(bytes);
            }
            FieldData::SuperDesc(_) => {
                let bytes = helper.receive_bytes(length)?.to_vec();
                *self.data_mut() = FieldData::SuperDesc(bytes);
            }
            FieldData::Descriptor => {
                if self.ty().kind() == FieldKind::HyperDesc {
                    helper.receive_bytes(length)?;
                }
            }
            FieldData::Reference(_) => {}
            FieldData::Redefinition { .. } => {
                let bytes = helper.receive_bytes(length)?.to_vec();
                special::set_redefinition_bytes(self, &bytes)?;
            }
        }
        trace!(
            field = %self.name(),
            pe = self.pe_index(),
            mu = self.mu_index(),
            offset = helper.offset(),
            value = %self.string(),
            "parsed value"
        );
        Ok(())
    }

    fn parse_alpha(&mut self, helper: &mut BufferHelper, option: &mut BufferOption) -> Result<()> {
        let ty = self.ty();
        let length = ty.length() as usize;
        let kind = ty.kind();
        if let Some(partial) = ty.partial_range() {
            let bytes = helper.receive_bytes(partial.length as usize)?.to_vec();
            *self.data_mut() = FieldData::Alpha { bytes, lob_size: 0 };
            return Ok(());
        }
        if kind.is_lob() && length == 0 {
            if option.second_call > 0 {
                let missing = (self.lob_size() as usize).saturating_sub(self.bytes()?.len());
                let chunk = helper.receive_bytes(missing)?.to_vec();
                alpha::append_lob(self, &chunk);
                return Ok(());
            }
            let lob_size = helper.receive_u32()?;
            let block = option.partial_lob_size as usize;
            let mut bytes = helper.receive_bytes(block)?.to_vec();
            if (lob_size as usize) < block {
                bytes.truncate(lob_size as usize);
            } else if lob_size as usize > block {
                option.need_second_call = SecondCall::ReadSecond;
            }
            *self.data_mut() = FieldData::Alpha { bytes, lob_size };
            return Ok(());
        }
        let bytes = match (length, kind) {
            (0, FieldKind::LAString | FieldKind::LAUnicode) => {
                let prefix = usize::from(helper.receive_u16()?);
                helper.receive_bytes(prefix.saturating_sub(2))?.to_vec()
            }
            (0, FieldKind::LBString | FieldKind::LBUnicode) => {
                let prefix = helper.receive_u32()? as usize;
                helper.receive_bytes(prefix.saturating_sub(4))?.to_vec()
            }
            (0, _) => self.receive_prefixed(helper)?,
            (n, _) => helper.receive_bytes(n)?.to_vec(),
        };
        let lob_size = bytes.len() as u32;
        *self.data_mut() = FieldData::Alpha { bytes, lob_size };
        Ok(())
    }

    /// Append this value to a store record buffer.
    pub fn store_buffer(&self, helper: &mut BufferHelper, option: &mut BufferOption) -> Result<()> {
        let ty = self.ty();
        let length = ty.length() as usize;
        match self.data() {
            FieldData::Unsigned(_) | FieldData::Signed(_) | FieldData::Float(_) => {
                let bytes = numeric::encode_with(self, self.wire_endian(helper))?;
                if length == 0 {
                    helper.put_u8(bytes.len() as u8 + 1);
                }
                helper.put_bytes(&bytes);
            }
            FieldData::Decimal(_) => {
                let bytes = self.bytes()?;
                if length == 0 {
                    helper.put_u8(bytes.len() as u8 + 1);
                }
                helper.put_bytes(&bytes);
            }
            FieldData::Alpha { bytes, .. } => self.store_alpha(bytes, helper, option)?,
            FieldData::Bytes(bytes) => {
                if length == 0 {
                    self.check_prefix(bytes.len(), 1, u8::MAX as usize - 1)?;
                    helper.put_u8(bytes.len() as u8 + 1);
                    helper.put_bytes(bytes);
                } else {
                    let mut fixed = bytes.clone();
                    fixed.resize(length, 0);
                    helper.put_bytes(&fixed);
                }
            }
            FieldData::Filler(bytes) => {
                let mut fixed = bytes.clone();
                fixed.resize(length, 0);
                helper.put_bytes(&fixed);
            }
            FieldData::Redefinition { main, .. } => helper.put_bytes(main),
            FieldData::Length(_)
            | FieldData::Descriptor
            | FieldData::SuperDesc(_)
            | FieldData::Reference(_) => {}
        }
        Ok(())
    }

    fn check_prefix(&self, payload: usize, prefix: usize, max: usize) -> Result<()> {
        if payload + prefix > max {
            return Err(AdaError::LengthTooLargeForKind {
                length: payload as u32,
                kind: self.ty().kind().name().to_string(),
                name: self.name().to_string(),
            });
        }
        Ok(())
    }

    fn store_alpha(&self, bytes: &[u8], helper: &mut BufferHelper, option: &mut BufferOption) -> Result<()> {
        let ty = self.ty();
        let length = ty.length() as usize;
        if length > 0 {
            let blank = ty.charset().unwrap_or_default().blank();
            let mut fixed = bytes.to_vec();
            fixed.resize(length, blank);
            helper.put_bytes(&fixed);
            return Ok(());
        }
        let payload: &[u8] = if bytes.is_empty() { b" " } else { bytes };
        match ty.kind() {
            FieldKind::LBString | FieldKind::LBUnicode => {
                let block = option.store_lob_block as usize;
                if payload.len() > block {
                    let start = option.second_call as usize * block;
                    let end = (start + block).min(payload.len());
                    helper.put_bytes(&payload[start.min(end)..end]);
                    if end < payload.len() {
                        option.need_second_call = SecondCall::StoreSecond;
                    }
                } else {
                    helper.put_u32(payload.len() as u32 + 4);
                    helper.put_bytes(payload);
                }
            }
            FieldKind::LAString | FieldKind::LAUnicode => {
                self.check_prefix(payload.len(), 2, u16::MAX as usize)?;
                helper.put_u16(payload.len() as u16 + 2);
                helper.put_bytes(payload);
            }
            _ => {
                self.check_prefix(payload.len(), 1, u8::MAX as usize - 1)?;
                helper.put_u8(payload.len() as u8 + 1);
                helper.put_bytes(payload);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::fdt::AdaType;

    fn value(kind: FieldKind, length: u32) -> FieldValue {
        FieldValue::new(Arc::new(AdaType::with_length(kind, "XX", length))).unwrap()
    }

    fn option() -> BufferOption {
        BufferOption::new(&EngineConfig::default())
    }

    #[test]
    fn test_parse_variable_integers() {
        let mut helper = BufferHelper::new(vec![0x02, 0xFF, 0x03, 0x01, 0x01], Endian::Little);
        let mut opt = option();
        let mut v = value(FieldKind::Int4, 0);
        v.parse_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(v.get_i64().unwrap(), -1);
        v.parse_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(v.get_i64().unwrap(), 257);
        assert!(helper.is_at_end());
    }

    #[test]
    fn test_parse_fixed_big_endian() {
        let mut helper = BufferHelper::new(vec![0, 0, 1, 0], Endian::Big);
        let mut v = value(FieldKind::UInt4, 4);
        v.parse_buffer(&mut helper, &mut option()).unwrap();
        assert_eq!(v.get_u32().unwrap(), 256);
    }

    #[test]
    fn test_store_variable_string() {
        let mut v = value(FieldKind::String, 0);
        v.set_string("abc").unwrap();
        let mut helper = BufferHelper::for_writing(Endian::Little);
        v.store_buffer(&mut helper, &mut option()).unwrap();
        assert_eq!(helper.buffer(), &[4, b'a', b'b', b'c']);

        let empty = value(FieldKind::String, 0);
        let mut helper = BufferHelper::for_writing(Endian::Little);
        empty.store_buffer(&mut helper, &mut option()).unwrap();
        assert_eq!(helper.buffer(), &[2, b' ']);
    }

    #[test]
    fn test_store_string_too_long() {
        let mut v = value(FieldKind::String, 0);
        v.set_string(&"x".repeat(300)).unwrap();
        let mut helper = BufferHelper::for_writing(Endian::Little);
        let err = v.store_buffer(&mut helper, &mut option()).unwrap_err();
        assert_eq!(err.code(), 117);
    }

    #[test]
    fn test_lob_two_calls() {
        let mut opt = option();
        opt.partial_lob_size = 4;
        let mut rb = vec![10, 0, 0, 0];
        rb.extend_from_slice(b"abcd");
        let mut helper = BufferHelper::new(rb, Endian::Little);
        let mut v = value(FieldKind::LBString, 0);
        v.parse_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(v.string(), "abcd");
        assert_eq!(v.lob_size(), 10);
        assert_eq!(opt.need_second_call, SecondCall::ReadSecond);

        opt.second_call = 1;
        let mut helper = BufferHelper::new(b"efghij".to_vec(), Endian::Little);
        v.parse_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(v.string(), "abcdefghij");
    }

    #[test]
    fn test_lob_shorter_than_block() {
        let mut opt = option();
        opt.partial_lob_size = 8;
        let mut rb = vec![3, 0, 0, 0];
        rb.extend_from_slice(b"xyz\0\0\0\0\0");
        let mut helper = BufferHelper::new(rb, Endian::Little);
        let mut v = value(FieldKind::LBString, 0);
        v.parse_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(v.string(), "xyz");
        assert_eq!(opt.need_second_call, SecondCall::None);
    }

    #[test]
    fn test_store_lob_chunks() {
        let mut opt = option();
        opt.store_lob_block = 4;
        let mut v = value(FieldKind::LBString, 0);
        v.set_string("abcdefghij").unwrap();
        let mut helper = BufferHelper::for_writing(Endian::Little);
        v.store_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(helper.buffer(), b"abcd");
        assert_eq!(opt.need_second_call, SecondCall::StoreSecond);

        opt.second_call = 2;
        opt.need_second_call = SecondCall::None;
        let mut helper = BufferHelper::for_writing(Endian::Little);
        v.store_buffer(&mut helper, &mut opt).unwrap();
        assert_eq!(helper.buffer(), b"ij");
        assert_eq!(opt.need_second_call, SecondCall::None);
    }
}
