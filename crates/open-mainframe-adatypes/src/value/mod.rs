//! Field and structure values.
//!
//! A [`FieldValue`] is one instance of a leaf type: the typed payload plus
//! its `(pe_index, mu_index)` position. A [`StructureValue`] holds one
//! [`Element`] per occurrence of a group, period group or multiple field.

mod alpha;
mod decimal;
mod numeric;
mod special;
mod wire;

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::fdt::{AdaType, TypeId};
use crate::kind::{FieldKind, TypeFlags};
use crate::{AdaError, Result};

// ── FieldData ──────────────────────────────────────────────────────

/// Typed payload of a leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    /// Unsigned binary integers and characters.
    Unsigned(u64),
    /// Signed binary integers.
    Signed(i64),
    /// Binary float or double.
    Float(f64),
    /// Packed or unpacked decimal, scaled by the fractional digits.
    Decimal(i128),
    /// Alpha or wide string in wire bytes; `lob_size` is the declared LOB total.
    Alpha {
        /// Wire bytes received or to be stored.
        bytes: Vec<u8>,
        /// Total LOB size reported by the server.
        lob_size: u32,
    },
    /// Binary byte array.
    Bytes(Vec<u8>),
    /// Length or occurrence count reported by the server.
    Length(u32),
    /// Filler bytes.
    Filler(Vec<u8>),
    /// Phonetic, collation, hyper or referential placeholder.
    Descriptor,
    /// Super or sub descriptor bytes.
    SuperDesc(Vec<u8>),
    /// `@name` reference text.
    Reference(String),
    /// Redefinition: main field bytes split into sub field values.
    Redefinition {
        /// Bytes of the redefined field.
        main: Vec<u8>,
        /// Sub field values over `main`.
        fields: Vec<FieldValue>,
    },
}

// ── ValueInput ─────────────────────────────────────────────────────

/// Input accepted by [`FieldValue::set`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueInput<'a> {
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Binary float.
    Float(f64),
    /// Decimal number.
    Decimal(Decimal),
    /// Text, parsed for numeric fields.
    Text(&'a str),
    /// Canonical wire bytes.
    Bytes(&'a [u8]),
}

macro_rules! value_input {
    ($variant:ident, $target:ty, $($ty:ty),+) => {
        $(impl From<$ty> for ValueInput<'_> {
            fn from(value: $ty) -> Self {
                Self::$variant(<$target>::from(value))
            }
        })+
    };
}

value_input!(Int, i64, i8, i16, i32, i64);
value_input!(UInt, u64, u8, u16, u32, u64);
value_input!(Float, f64, f32, f64);

impl From<Decimal> for ValueInput<'_> {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl<'a> From<&'a str> for ValueInput<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a String> for ValueInput<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a [u8]> for ValueInput<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::Bytes(value)
    }
}

// ── FieldValue ─────────────────────────────────────────────────────

/// One instance of a leaf type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    ty: Arc<AdaType>,
    type_id: Option<TypeId>,
    pe_index: u32,
    mu_index: u32,
    data: FieldData,
}

impl FieldValue {
    /// Fresh value for `ty`.
    pub fn new(ty: Arc<AdaType>) -> Result<Self> {
        let data = match ty.kind() {
            FieldKind::UByte
            | FieldKind::UInt2
            | FieldKind::UInt4
            | FieldKind::UInt8
            | FieldKind::Character => FieldData::Unsigned(0),
            FieldKind::Byte | FieldKind::Int2 | FieldKind::Int4 | FieldKind::Int8 => {
                FieldData::Signed(0)
            }
            FieldKind::Float | FieldKind::Double => match ty.length() {
                4 | 8 => FieldData::Float(0.0),
                length => {
                    return Err(AdaError::InvalidFloatLength {
                        length,
                        name: ty.name().to_string(),
                    })
                }
            },
            FieldKind::Packed | FieldKind::Unpacked => FieldData::Decimal(0),
            k if k.is_alpha() => FieldData::Alpha {
                bytes: Vec::new(),
                lob_size: 0,
            },
            FieldKind::ByteArray => FieldData::Bytes(vec![0; ty.length() as usize]),
            FieldKind::FieldLength => FieldData::Length(0),
            FieldKind::Filler => FieldData::Filler(vec![0; ty.length() as usize]),
            k if k.is_placeholder() => FieldData::Descriptor,
            FieldKind::SuperDesc => FieldData::SuperDesc(Vec::new()),
            FieldKind::Redefinition => special::new_redefinition(&ty)?,
            kind => {
                return Err(AdaError::UnsupportedKind {
                    kind: kind.name().to_string(),
                    name: ty.name().to_string(),
                })
            }
        };
        let data = if ty.has_flag(TypeFlags::REFERENCE) {
            FieldData::Reference(String::new())
        } else {
            data
        };
        Ok(Self {
            ty,
            type_id: None,
            pe_index: 0,
            mu_index: 0,
            data,
        })
    }

    /// Builder: node id in the active tree.
    pub fn with_type_id(mut self, id: TypeId) -> Self {
        self.type_id = Some(id);
        self
    }

    /// Builder: occurrence position.
    pub fn with_index(mut self, pe_index: u32, mu_index: u32) -> Self {
        self.pe_index = pe_index;
        self.mu_index = mu_index;
        self
    }

    /// Type of the value.
    pub fn ty(&self) -> &AdaType {
        &self.ty
    }

    /// Shared type handle.
    pub fn type_arc(&self) -> Arc<AdaType> {
        Arc::clone(&self.ty)
    }

    /// Node id in the active tree.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Field name.
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// Period group index, 0 outside a PE.
    pub fn pe_index(&self) -> u32 {
        self.pe_index
    }

    /// Multiple field index, 0 outside an MU.
    pub fn mu_index(&self) -> u32 {
        self.mu_index
    }

    /// Set the occurrence position.
    pub fn set_index(&mut self, pe_index: u32, mu_index: u32) {
        self.pe_index = pe_index;
        self.mu_index = mu_index;
    }

    /// Typed payload.
    pub fn data(&self) -> &FieldData {
        &self.data
    }

    /// Total LOB size reported by the server.
    pub fn lob_size(&self) -> u32 {
        match &self.data {
            FieldData::Alpha { lob_size, .. } => *lob_size,
            _ => 0,
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut FieldData {
        &mut self.data
    }

    fn not_representable(&self, target: &str) -> AdaError {
        AdaError::NotRepresentable {
            name: self.name().to_string(),
            target: target.to_string(),
        }
    }

    fn type_mismatch(&self, input: &str) -> AdaError {
        AdaError::TypeMismatch {
            input: input.to_string(),
            name: self.name().to_string(),
        }
    }

    fn ensure_settable(&self) -> Result<()> {
        match self.data {
            FieldData::Descriptor | FieldData::SuperDesc(_) => {
                Err(AdaError::DescriptorNotSettable {
                    name: self.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    // ── Setters ──

    /// Assign any supported input.
    pub fn set<'a>(&mut self, value: impl Into<ValueInput<'a>>) -> Result<()> {
        match value.into() {
            ValueInput::Int(v) => self.set_i64(v),
            ValueInput::UInt(v) => self.set_u64(v),
            ValueInput::Float(v) => self.set_f64(v),
            ValueInput::Decimal(v) => self.set_decimal(v),
            ValueInput::Text(v) => self.set_string(v),
            ValueInput::Bytes(v) => self.set_bytes(v),
        }
    }

    /// Assign a signed integer.
    pub fn set_i64(&mut self, value: i64) -> Result<()> {
        self.set_integer(i128::from(value))
    }

    /// Assign an unsigned integer.
    pub fn set_u64(&mut self, value: u64) -> Result<()> {
        self.set_integer(i128::from(value))
    }

    /// Assign a float; integral fields accept only integral values.
    pub fn set_f64(&mut self, value: f64) -> Result<()> {
        self.ensure_settable()?;
        match &mut self.data {
            FieldData::Float(v) => {
                *v = if self.ty.length() == 4 {
                    f64::from(value as f32)
                } else {
                    value
                };
                Ok(())
            }
            FieldData::Decimal(_) => {
                let scaled = value * 10f64.powi(self.ty.fractional() as i32);
                if !scaled.is_finite() {
                    return Err(self.range_overflow(value));
                }
                self.set_scaled(scaled.round() as i128, &value.to_string())
            }
            FieldData::Alpha { .. } | FieldData::Reference(_) => {
                self.set_string(&value.to_string())
            }
            _ => {
                if value.fract() != 0.0 || !value.is_finite() {
                    return Err(self.type_mismatch("f64"));
                }
                self.set_integer(value as i128)
            }
        }
    }

    /// Assign a decimal; packed and unpacked fields round to their fractional digits.
    pub fn set_decimal(&mut self, value: Decimal) -> Result<()> {
        self.ensure_settable()?;
        match &self.data {
            FieldData::Decimal(_) => {
                let mut scaled = value.round_dp_with_strategy(
                    self.ty.fractional(),
                    RoundingStrategy::MidpointAwayFromZero,
                );
                scaled.rescale(self.ty.fractional());
                self.set_scaled(scaled.mantissa(), &value.to_string())
            }
            FieldData::Float(_) => {
                let f = value
                    .to_string()
                    .parse::<f64>()
                    .map_err(|_| self.type_mismatch("decimal"))?;
                self.set_f64(f)
            }
            FieldData::Alpha { .. } | FieldData::Reference(_) => {
                self.set_string(&value.to_string())
            }
            _ => {
                if !value.fract().is_zero() {
                    return Err(self.type_mismatch("decimal"));
                }
                let mut integral = value.trunc();
                integral.rescale(0);
                self.set_integer(integral.mantissa())
            }
        }
    }

    /// Assign text: alpha fields take it as is, numeric fields parse it.
    pub fn set_string(&mut self, text: &str) -> Result<()> {
        self.ensure_settable()?;
        match &self.data {
            FieldData::Alpha { .. } => {
                alpha::set_text(self, text);
                Ok(())
            }
            FieldData::Reference(_) => {
                self.data = FieldData::Reference(text.to_string());
                Ok(())
            }
            FieldData::Bytes(_) => self.set_bytes(text.as_bytes()),
            FieldData::Unsigned(_) if self.ty.kind() == FieldKind::Character => {
                match text.as_bytes().first() {
                    Some(b) => self.set_integer(i128::from(*b)),
                    None => self.set_integer(i128::from(b' ')),
                }
            }
            FieldData::Decimal(_) => {
                let value = text.trim().parse::<Decimal>().map_err(|_| self.invalid_number(text))?;
                self.set_decimal(value)
            }
            FieldData::Float(_) => {
                let value = text.trim().parse::<f64>().map_err(|_| self.invalid_number(text))?;
                self.set_f64(value)
            }
            FieldData::Unsigned(_) | FieldData::Signed(_) | FieldData::Length(_) => {
                let value = text.trim().parse::<i128>().map_err(|_| self.invalid_number(text))?;
                self.set_integer(value)
            }
            FieldData::Filler(_) => Ok(()),
            _ => Err(self.type_mismatch("string")),
        }
    }

    /// Text assignment accepting any kind, alias of [`FieldValue::set_string`].
    pub fn set_from_text(&mut self, text: &str) -> Result<()> {
        self.set_string(text)
    }

    /// Wire-level assignment of the canonical encoding.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_settable()?;
        match &self.data {
            FieldData::Unsigned(_) | FieldData::Signed(_) | FieldData::Float(_) => {
                numeric::set_wire_bytes(self, bytes)
            }
            FieldData::Decimal(_) => decimal::set_wire_bytes(self, bytes),
            FieldData::Alpha { .. } => {
                alpha::set_wire_bytes(self, bytes);
                Ok(())
            }
            FieldData::Bytes(_) => alpha::set_byte_array(self, bytes),
            FieldData::Length(_) => {
                let value = numeric::decode_unsigned(self, bytes)?;
                self.set_integer(i128::from(value))
            }
            FieldData::Filler(_) => {
                self.data = FieldData::Filler(bytes.to_vec());
                Ok(())
            }
            FieldData::Reference(_) => {
                self.data = FieldData::Reference(String::from_utf8_lossy(bytes).into_owned());
                Ok(())
            }
            FieldData::Redefinition { .. } => special::set_redefinition_bytes(self, bytes),
            FieldData::Descriptor | FieldData::SuperDesc(_) => Err(self.type_mismatch("bytes")),
        }
    }

    pub(crate) fn set_integer(&mut self, value: i128) -> Result<()> {
        self.ensure_settable()?;
        match &mut self.data {
            FieldData::Unsigned(v) => {
                if value < 0 {
                    return Err(AdaError::NegativeUnsigned {
                        name: self.ty.name().to_string(),
                        value: value.to_string(),
                    });
                }
                let width = self.ty.kind().integer_width().unwrap_or(8);
                let max = if width >= 8 {
                    i128::from(u64::MAX)
                } else {
                    (1i128 << (8 * width)) - 1
                };
                if value > max {
                    return Err(self.range_overflow(value));
                }
                *v = value as u64;
                Ok(())
            }
            FieldData::Signed(v) => {
                let width = self.ty.kind().integer_width().unwrap_or(8);
                let bound = 1i128 << (8 * width - 1);
                if value < -bound || value >= bound {
                    return Err(self.range_overflow(value));
                }
                *v = value as i64;
                Ok(())
            }
            FieldData::Float(v) => {
                *v = value as f64;
                Ok(())
            }
            FieldData::Decimal(_) => {
                let factor = 10i128.checked_pow(self.ty.fractional());
                match factor.and_then(|f| value.checked_mul(f)) {
                    Some(scaled) => self.set_scaled(scaled, &value.to_string()),
                    None => Err(self.range_overflow(value)),
                }
            }
            FieldData::Length(v) => match u32::try_from(value) {
                Ok(length) => {
                    *v = length;
                    Ok(())
                }
                Err(_) => Err(AdaError::RangeOverflow {
                    name: self.ty.name().to_string(),
                    value: value.to_string(),
                    length: self.ty.length(),
                }),
            },
            FieldData::Alpha { .. } | FieldData::Reference(_) => {
                self.set_string(&value.to_string())
            }
            _ => Err(self.type_mismatch("integer")),
        }
    }

    fn set_scaled(&mut self, scaled: i128, original: &str) -> Result<()> {
        if !decimal::fits(self.ty(), scaled) {
            return Err(AdaError::RangeOverflow {
                name: self.name().to_string(),
                value: original.to_string(),
                length: self.ty.length(),
            });
        }
        self.data = FieldData::Decimal(scaled);
        Ok(())
    }

    fn range_overflow(&self, value: impl std::fmt::Display) -> AdaError {
        AdaError::RangeOverflow {
            name: self.name().to_string(),
            value: value.to_string(),
            length: self.ty.length(),
        }
    }

    fn invalid_number(&self, text: &str) -> AdaError {
        AdaError::InvalidNumber {
            name: self.name().to_string(),
            value: text.to_string(),
        }
    }

    // ── Getters ──

    fn integer(&self, target: &str) -> Result<i128> {
        match &self.data {
            FieldData::Unsigned(v) => Ok(i128::from(*v)),
            FieldData::Signed(v) => Ok(i128::from(*v)),
            FieldData::Length(v) => Ok(i128::from(*v)),
            FieldData::Decimal(v) if self.ty.fractional() == 0 => Ok(*v),
            FieldData::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(*v as i128),
            _ => Err(self.not_representable(target)),
        }
    }

    /// Value as `i8`.
    pub fn get_i8(&self) -> Result<i8> {
        i8::try_from(self.integer("signed 8-bit integer")?)
            .map_err(|_| self.not_representable("signed 8-bit integer"))
    }

    /// Value as `u8`.
    pub fn get_u8(&self) -> Result<u8> {
        u8::try_from(self.integer("unsigned 8-bit integer")?)
            .map_err(|_| self.not_representable("unsigned 8-bit integer"))
    }

    /// Value as `i16`.
    pub fn get_i16(&self) -> Result<i16> {
        i16::try_from(self.integer("signed 16-bit integer")?)
            .map_err(|_| self.not_representable("signed 16-bit integer"))
    }

    /// Value as `u16`.
    pub fn get_u16(&self) -> Result<u16> {
        u16::try_from(self.integer("unsigned 16-bit integer")?)
            .map_err(|_| self.not_representable("unsigned 16-bit integer"))
    }

    /// Value as `i32`.
    pub fn get_i32(&self) -> Result<i32> {
        i32::try_from(self.integer("signed 32-bit integer")?)
            .map_err(|_| self.not_representable("signed 32-bit integer"))
    }

    /// Value as `u32`.
    pub fn get_u32(&self) -> Result<u32> {
        u32::try_from(self.integer("unsigned 32-bit integer")?)
            .map_err(|_| self.not_representable("unsigned 32-bit integer"))
    }

    /// Value as `i64`.
    pub fn get_i64(&self) -> Result<i64> {
        i64::try_from(self.integer("signed 64-bit integer")?)
            .map_err(|_| self.not_representable("signed 64-bit integer"))
    }

    /// Value as `u64`.
    pub fn get_u64(&self) -> Result<u64> {
        u64::try_from(self.integer("unsigned 64-bit integer")?)
            .map_err(|_| self.not_representable("unsigned 64-bit integer"))
    }

    /// Value as `f64`; succeeds for every numeric kind.
    pub fn get_f64(&self) -> Result<f64> {
        match &self.data {
            FieldData::Unsigned(v) => Ok(*v as f64),
            FieldData::Signed(v) => Ok(*v as f64),
            FieldData::Length(v) => Ok(f64::from(*v)),
            FieldData::Float(v) => Ok(*v),
            FieldData::Decimal(v) => Ok(*v as f64 / 10f64.powi(self.ty.fractional() as i32)),
            _ => Err(self.not_representable("64-bit float")),
        }
    }

    /// Value as decimal, keeping the fractional digits of packed fields.
    pub fn get_decimal(&self) -> Result<Decimal> {
        match &self.data {
            FieldData::Decimal(v) => Decimal::try_from_i128_with_scale(*v, self.ty.fractional())
                .map_err(|_| self.not_representable("decimal")),
            FieldData::Float(v) => Decimal::try_from(*v).map_err(|_| self.not_representable("decimal")),
            _ => {
                let v = self.integer("decimal")?;
                Decimal::try_from_i128_with_scale(v, 0).map_err(|_| self.not_representable("decimal"))
            }
        }
    }

    /// Canonical wire encoding without length prefix.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match &self.data {
            FieldData::Unsigned(_) | FieldData::Signed(_) | FieldData::Float(_) => {
                numeric::encode(self)
            }
            FieldData::Decimal(v) => decimal::encode(self.ty(), *v),
            FieldData::Alpha { bytes, .. } => Ok(bytes.clone()),
            FieldData::Bytes(bytes) | FieldData::Filler(bytes) | FieldData::SuperDesc(bytes) => {
                Ok(bytes.clone())
            }
            FieldData::Length(v) => Ok(v.to_le_bytes().to_vec()),
            FieldData::Descriptor => Ok(Vec::new()),
            FieldData::Reference(text) => Ok(text.as_bytes().to_vec()),
            FieldData::Redefinition { main, .. } => Ok(main.clone()),
        }
    }

    /// Human readable rendering.
    pub fn string(&self) -> String {
        match &self.data {
            FieldData::Unsigned(v) if self.ty.kind() == FieldKind::Character => {
                char::from(*v as u8).to_string()
            }
            FieldData::Unsigned(v) => v.to_string(),
            FieldData::Signed(v) => v.to_string(),
            FieldData::Float(v) => v.to_string(),
            FieldData::Length(v) => v.to_string(),
            FieldData::Decimal(v) => decimal::format_scaled(*v, self.ty.fractional()),
            FieldData::Alpha { bytes, .. } => self.ty.charset().unwrap_or_default().decode(bytes),
            FieldData::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(u8::to_string).collect();
                format!("[{}]", parts.join(" "))
            }
            FieldData::Filler(_) => String::new(),
            FieldData::Descriptor => String::new(),
            FieldData::SuperDesc(bytes) => special::super_desc_string(self.ty(), bytes),
            FieldData::Reference(text) => text.clone(),
            FieldData::Redefinition { fields, .. } => fields
                .iter()
                .map(FieldValue::string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Sub field values of a redefinition.
    pub fn redefinition_fields(&self) -> &[FieldValue] {
        match &self.data {
            FieldData::Redefinition { fields, .. } => fields,
            _ => &[],
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.string())
    }
}

// ── Element ────────────────────────────────────────────────────────

/// One occurrence of a structure value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    index: u32,
    values: Vec<AdaValue>,
    by_name: HashMap<String, usize>,
}

impl Element {
    /// Empty element for occurrence `index`.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            values: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Occurrence index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Child values in declaration order.
    pub fn values(&self) -> &[AdaValue] {
        &self.values
    }

    /// Mutable child values.
    pub fn values_mut(&mut self) -> &mut [AdaValue] {
        &mut self.values
    }

    /// Append a child value.
    pub fn push(&mut self, value: AdaValue) {
        self.by_name
            .entry(value.name().to_string())
            .or_insert(self.values.len());
        self.values.push(value);
    }

    /// Direct child by name.
    pub fn get(&self, name: &str) -> Option<&AdaValue> {
        self.by_name.get(name).map(|i| &self.values[*i])
    }

    /// Mutable direct child by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AdaValue> {
        match self.by_name.get(name) {
            Some(i) => self.values.get_mut(*i),
            None => None,
        }
    }
}

// ── StructureValue ─────────────────────────────────────────────────

/// One instance of a structure type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureValue {
    ty: Arc<AdaType>,
    type_id: Option<TypeId>,
    pe_index: u32,
    mu_index: u32,
    elements: Vec<Element>,
}

impl StructureValue {
    /// Structure value without elements.
    pub fn new(ty: Arc<AdaType>) -> Self {
        Self {
            ty,
            type_id: None,
            pe_index: 0,
            mu_index: 0,
            elements: Vec::new(),
        }
    }

    /// Builder: node id in the active tree.
    pub fn with_type_id(mut self, id: TypeId) -> Self {
        self.type_id = Some(id);
        self
    }

    /// Builder: occurrence position.
    pub fn with_index(mut self, pe_index: u32, mu_index: u32) -> Self {
        self.pe_index = pe_index;
        self.mu_index = mu_index;
        self
    }

    /// Type of the structure.
    pub fn ty(&self) -> &AdaType {
        &self.ty
    }

    /// Node id in the active tree.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Structure name.
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    /// Enclosing period group index.
    pub fn pe_index(&self) -> u32 {
        self.pe_index
    }

    /// Enclosing multiple field index.
    pub fn mu_index(&self) -> u32 {
        self.mu_index
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Mutable elements.
    pub fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    /// Number of occurrences.
    pub fn nr_elements(&self) -> usize {
        self.elements.len()
    }

    /// Element with occurrence `index`.
    pub fn element(&self, index: u32) -> Option<&Element> {
        self.elements.iter().find(|e| e.index == index)
    }

    /// Mutable element with occurrence `index`.
    pub fn element_mut(&mut self, index: u32) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.index == index)
    }

    /// Append a new element and return it.
    pub fn add_element(&mut self, index: u32) -> &mut Element {
        self.elements.push(Element::new(index));
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    /// Drop all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Value `name` in the element at 1-based `position`, searching nested structures.
    pub fn get(&self, name: &str, position: usize) -> Option<&AdaValue> {
        let element = self.elements.get(position.checked_sub(1)?)?;
        find_in(element.values(), name)
    }
}

fn find_in<'a>(values: &'a [AdaValue], name: &str) -> Option<&'a AdaValue> {
    for value in values {
        if value.name() == name {
            return Some(value);
        }
        if let AdaValue::Structure(s) = value {
            for element in s.elements() {
                if let Some(found) = find_in(element.values(), name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

// ── AdaValue ───────────────────────────────────────────────────────

/// Node of the value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum AdaValue {
    /// Leaf value.
    Field(FieldValue),
    /// Structure value.
    Structure(StructureValue),
}

impl AdaValue {
    /// Type of the node.
    pub fn ty(&self) -> &AdaType {
        match self {
            Self::Field(f) => f.ty(),
            Self::Structure(s) => s.ty(),
        }
    }

    /// Field or structure name.
    pub fn name(&self) -> &str {
        self.ty().name()
    }

    /// Node id in the active tree.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Self::Field(f) => f.type_id(),
            Self::Structure(s) => s.type_id(),
        }
    }

    /// Period group index.
    pub fn pe_index(&self) -> u32 {
        match self {
            Self::Field(f) => f.pe_index(),
            Self::Structure(s) => s.pe_index(),
        }
    }

    /// Multiple field index.
    pub fn mu_index(&self) -> u32 {
        match self {
            Self::Field(f) => f.mu_index(),
            Self::Structure(s) => s.mu_index(),
        }
    }

    /// Leaf value, if this is one.
    pub fn as_field(&self) -> Option<&FieldValue> {
        match self {
            Self::Field(f) => Some(f),
            Self::Structure(_) => None,
        }
    }

    /// Mutable leaf value.
    pub fn as_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self {
            Self::Field(f) => Some(f),
            Self::Structure(_) => None,
        }
    }

    /// Structure value, if this is one.
    pub fn as_structure(&self) -> Option<&StructureValue> {
        match self {
            Self::Structure(s) => Some(s),
            Self::Field(_) => None,
        }
    }

    /// Mutable structure value.
    pub fn as_structure_mut(&mut self) -> Option<&mut StructureValue> {
        match self {
            Self::Structure(s) => Some(s),
            Self::Field(_) => None,
        }
    }

    /// Rendering used by value dumps.
    pub fn string(&self) -> String {
        match self {
            Self::Field(f) => f.string(),
            Self::Structure(s) => format!("[{}]", s.nr_elements()),
        }
    }

    /// Append dump lines for this node and its children.
    pub fn dump(&self, out: &mut String) {
        let level = usize::from(self.ty().level().max(1));
        let indent = "  ".repeat(level - 1);
        match self {
            Self::Field(f) => {
                let index = match (f.pe_index(), f.mu_index()) {
                    (0, 0) => String::new(),
                    (pe, 0) => format!("[{pe}]"),
                    (0, mu) => format!("[{mu}]"),
                    (pe, mu) => format!("[{pe},{mu}]"),
                };
                out.push_str(&format!("{indent}{}{index} = >{}<\n", f.name(), f.string()));
            }
            Self::Structure(s) => {
                out.push_str(&format!("{indent}{} = [{}]\n", s.name(), s.nr_elements()));
                for element in s.elements() {
                    for value in element.values() {
                        value.dump(out);
                    }
                }
            }
        }
    }
}

impl AdaValue {
    /// JSON rendering: numbers stay numeric, PE and MU become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Field(f) => match f.data() {
                FieldData::Unsigned(v) if f.ty().kind() != FieldKind::Character => Value::from(*v),
                FieldData::Signed(v) => Value::from(*v),
                FieldData::Float(v) => Value::from(*v),
                _ => Value::String(f.string()),
            },
            Self::Structure(s) => match s.ty().kind() {
                FieldKind::MultipleField => Value::Array(
                    s.elements()
                        .iter()
                        .filter_map(|e| e.values().first().map(AdaValue::to_json))
                        .collect(),
                ),
                FieldKind::PeriodGroup => Value::Array(s.elements().iter().map(Element::to_json).collect()),
                _ if s.nr_elements() == 1 => s.elements()[0].to_json(),
                _ => Value::Array(s.elements().iter().map(Element::to_json).collect()),
            },
        }
    }
}

impl Element {
    /// JSON object of the element's values by name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values()
            .iter()
            .map(|v| (v.name().to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl From<FieldValue> for AdaValue {
    fn from(value: FieldValue) -> Self {
        Self::Field(value)
    }
}

impl From<StructureValue> for AdaValue {
    fn from(value: StructureValue) -> Self {
        Self::Structure(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Endian;

    fn field(ty: AdaType) -> FieldValue {
        FieldValue::new(Arc::new(ty)).unwrap()
    }

    #[test]
    fn test_unsigned_rejects_negative() {
        let mut v = field(AdaType::new(FieldKind::UInt4, "U4"));
        assert!(matches!(v.set_i64(-1), Err(AdaError::NegativeUnsigned { .. })));
        assert_eq!(v.set_i64(-1).unwrap_err().code(), 101);
        v.set_u64(4_000_000_000).unwrap();
        assert_eq!(v.get_u32().unwrap(), 4_000_000_000);
        assert!(matches!(v.get_i32(), Err(AdaError::NotRepresentable { .. })));
        assert!(matches!(v.set_u64(1 << 32), Err(AdaError::RangeOverflow { .. })));
    }

    #[test]
    fn test_field_length_range() {
        let mut v = field(AdaType::new(FieldKind::FieldLength, "LN"));
        v.set_i64(1234).unwrap();
        assert_eq!(v.get_u32().unwrap(), 1234);
        assert!(matches!(v.set_i64(-1), Err(AdaError::RangeOverflow { .. })));
        assert!(matches!(v.set_u64(1 << 32), Err(AdaError::RangeOverflow { .. })));
        assert_eq!(v.get_u32().unwrap(), 1234);
    }

    #[test]
    fn test_signed_range() {
        let mut v = field(AdaType::new(FieldKind::Int2, "I2"));
        v.set_i64(-32768).unwrap();
        assert_eq!(v.get_i16().unwrap(), -32768);
        assert!(v.set_i64(32768).is_err());
        assert!(matches!(v.get_u16(), Err(AdaError::NotRepresentable { .. })));
        assert_eq!(v.get_f64().unwrap(), -32768.0);
    }

    #[test]
    fn test_set_float_on_integer() {
        let mut v = field(AdaType::new(FieldKind::Int4, "I4"));
        v.set_f64(12.0).unwrap();
        assert_eq!(v.get_i32().unwrap(), 12);
        assert!(matches!(v.set_f64(1.5), Err(AdaError::TypeMismatch { .. })));
    }

    #[test]
    fn test_set_string_numeric() {
        let mut v = field(AdaType::new(FieldKind::UInt8, "U8"));
        v.set_string("12345678901").unwrap();
        assert_eq!(v.get_u64().unwrap(), 12_345_678_901);
        assert!(matches!(v.set_string("12a"), Err(AdaError::InvalidNumber { .. })));
    }

    #[test]
    fn test_float_length_checked() {
        let ty = AdaType::with_length(FieldKind::Float, "FL", 6);
        let err = FieldValue::new(Arc::new(ty)).unwrap_err();
        assert_eq!(err.code(), 110);
    }

    #[test]
    fn test_float_single_precision() {
        let mut v = field(AdaType::new(FieldKind::Float, "FL").with_endian(Endian::Little));
        v.set_f64(1.25).unwrap();
        assert_eq!(v.bytes().unwrap(), 1.25f32.to_le_bytes().to_vec());
        assert_eq!(v.get_f64().unwrap(), 1.25);
    }

    #[test]
    fn test_descriptor_not_settable() {
        let mut v = field(AdaType::phonetic("PH", 20, "AE"));
        assert!(matches!(v.set_i64(1), Err(AdaError::DescriptorNotSettable { .. })));
        assert_eq!(v.string(), "");
    }

    #[test]
    fn test_structure_get() {
        let pe = Arc::new(AdaType::structure(FieldKind::PeriodGroup, "PE"));
        let mut s = StructureValue::new(pe);
        let mut gs = field(AdaType::new(FieldKind::String, "GS"));
        gs.set_string("a").unwrap();
        gs.set_index(1, 0);
        s.add_element(1).push(AdaValue::Field(gs));
        let found = s.get("GS", 1).and_then(AdaValue::as_field).unwrap();
        assert_eq!(found.string(), "a");
        assert_eq!(found.pe_index(), 1);
        assert!(s.get("GS", 2).is_none());
        assert!(s.element(1).unwrap().get("GS").is_some());
    }

    #[test]
    fn test_dump_lines() {
        let mut ty = AdaType::with_length(FieldKind::Packed, "GM", 5);
        ty.add_flag(TypeFlags::MU);
        let mut v = field(ty);
        v.set_i64(555).unwrap();
        v.set_index(2, 1);
        let mut out = String::new();
        AdaValue::Field(v).dump(&mut out);
        assert_eq!(out, "GM[2,1] = >555<\n");
    }
}
