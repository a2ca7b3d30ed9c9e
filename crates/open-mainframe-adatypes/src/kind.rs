//! Field kinds, type flags and FDT options.

use serde::{Deserialize, Serialize};

use crate::{AdaError, Result};

// ── FieldKind ──────────────────────────────────────────────────────

/// Closed set of field and structure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Unsigned 1-byte binary.
    UByte,
    /// Signed 1-byte binary.
    Byte,
    /// Unsigned 2-byte binary.
    UInt2,
    /// Signed 2-byte binary.
    Int2,
    /// Unsigned 4-byte binary.
    UInt4,
    /// Signed 4-byte binary.
    Int4,
    /// Unsigned 8-byte binary.
    UInt8,
    /// Signed 8-byte binary.
    Int8,
    /// Packed decimal.
    Packed,
    /// Unpacked (zoned) decimal.
    Unpacked,
    /// 4-byte binary float.
    Float,
    /// 8-byte binary float.
    Double,
    /// Single character.
    Character,
    /// Alphanumeric, fixed or 1-byte length prefixed.
    String,
    /// Large alphanumeric, 2-byte length prefix.
    LAString,
    /// Large object alphanumeric, 4-byte length prefix.
    LBString,
    /// Wide character string.
    Unicode,
    /// Large wide character string.
    LAUnicode,
    /// Large object wide character string.
    LBUnicode,
    /// Binary byte array.
    ByteArray,
    /// Filler bytes.
    Filler,
    /// Length or occurrence count reported by the server.
    FieldLength,
    /// Group.
    Group,
    /// Period group (PE).
    PeriodGroup,
    /// Multiple value field (MU).
    MultipleField,
    /// Generic structure.
    Structure,
    /// Redefinition of a leaf.
    Redefinition,
    /// Phonetic descriptor.
    Phonetic,
    /// Super or sub descriptor.
    SuperDesc,
    /// Hyper descriptor.
    HyperDesc,
    /// Collation descriptor.
    Collation,
    /// Referential integrity constraint.
    Referential,
}

impl FieldKind {
    /// Format character used in the format buffer.
    pub fn format_character(self) -> char {
        match self {
            Self::Character | Self::String | Self::LAString | Self::LBString => 'A',
            Self::Unicode | Self::LAUnicode | Self::LBUnicode => 'W',
            Self::UByte
            | Self::UInt2
            | Self::UInt4
            | Self::UInt8
            | Self::ByteArray
            | Self::FieldLength => 'B',
            Self::Byte | Self::Int2 | Self::Int4 | Self::Int8 => 'F',
            Self::Packed => 'P',
            Self::Unpacked => 'U',
            Self::Float | Self::Double => 'G',
            _ => ' ',
        }
    }

    /// Kind for an FDT format character and length.
    pub fn evaluate(format: char, length: u32) -> Result<Self> {
        let kind = match (format, length) {
            ('A', 1) => Self::Byte,
            ('A', _) => Self::String,
            ('W', _) => Self::Unicode,
            ('B', 1) => Self::UByte,
            ('B', 2) => Self::UInt2,
            ('B', 4) => Self::UInt4,
            ('B', 8) => Self::UInt8,
            ('B', _) => Self::ByteArray,
            ('F', 1) => Self::Byte,
            ('F', 2) => Self::Int2,
            ('F', 4) => Self::Int4,
            ('F', 8) => Self::Int8,
            ('F', _) => Self::ByteArray,
            ('P', _) => Self::Packed,
            ('U', _) => Self::Unpacked,
            ('G', _) => Self::Float,
            _ => {
                return Err(AdaError::InvalidFormatCharacter {
                    format,
                    name: String::new(),
                })
            }
        };
        Ok(kind)
    }

    /// Length assigned when none is declared.
    pub fn default_length(self) -> u32 {
        match self {
            Self::UInt2 | Self::Int2 => 2,
            Self::UInt4 | Self::Int4 | Self::Float | Self::FieldLength => 4,
            Self::UInt8 | Self::Int8 | Self::Double => 8,
            Self::LAString | Self::LBString | Self::LAUnicode | Self::LBUnicode => 0,
            k if k.is_structure() || k.is_placeholder() => 0,
            Self::SuperDesc | Self::Redefinition => 0,
            _ => 1,
        }
    }

    /// Width in bytes of the binary integer kinds.
    pub fn integer_width(self) -> Option<u32> {
        match self {
            Self::UByte | Self::Byte | Self::Character => Some(1),
            Self::UInt2 | Self::Int2 => Some(2),
            Self::UInt4 | Self::Int4 => Some(4),
            Self::UInt8 | Self::Int8 => Some(8),
            _ => None,
        }
    }

    /// Signed binary integer.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Byte | Self::Int2 | Self::Int4 | Self::Int8)
    }

    /// Unsigned binary integer.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::UByte | Self::UInt2 | Self::UInt4 | Self::UInt8 | Self::Character
        )
    }

    /// Alphanumeric or wide string.
    pub fn is_alpha(self) -> bool {
        matches!(
            self,
            Self::String
                | Self::LAString
                | Self::LBString
                | Self::Unicode
                | Self::LAUnicode
                | Self::LBUnicode
        )
    }

    /// Large object string (4-byte length prefix).
    pub fn is_lob(self) -> bool {
        matches!(self, Self::LBString | Self::LBUnicode)
    }

    /// Composite kind owning child types.
    pub fn is_structure(self) -> bool {
        matches!(
            self,
            Self::Group | Self::PeriodGroup | Self::MultipleField | Self::Structure
        )
    }

    /// Descriptor kinds that never carry data of their own.
    pub fn is_placeholder(self) -> bool {
        matches!(
            self,
            Self::Phonetic | Self::Collation | Self::HyperDesc | Self::Referential
        )
    }

    /// All descriptor kinds, including super descriptors.
    pub fn is_special_descriptor(self) -> bool {
        self.is_placeholder() || self == Self::SuperDesc
    }

    /// Kind name as used in messages and dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::UByte => "UByte",
            Self::Byte => "Byte",
            Self::UInt2 => "UInt2",
            Self::Int2 => "Int2",
            Self::UInt4 => "UInt4",
            Self::Int4 => "Int4",
            Self::UInt8 => "UInt8",
            Self::Int8 => "Int8",
            Self::Packed => "Packed",
            Self::Unpacked => "Unpacked",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Character => "Character",
            Self::String => "String",
            Self::LAString => "LAString",
            Self::LBString => "LBString",
            Self::Unicode => "Unicode",
            Self::LAUnicode => "LAUnicode",
            Self::LBUnicode => "LBUnicode",
            Self::ByteArray => "ByteArray",
            Self::Filler => "Filler",
            Self::FieldLength => "FieldLength",
            Self::Group => "Group",
            Self::PeriodGroup => "PeriodGroup",
            Self::MultipleField => "MultipleField",
            Self::Structure => "Structure",
            Self::Redefinition => "Redefinition",
            Self::Phonetic => "Phonetic",
            Self::SuperDesc => "SuperDesc",
            Self::HyperDesc => "HyperDesc",
            Self::Collation => "Collation",
            Self::Referential => "Referential",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── TypeFlags ──────────────────────────────────────────────────────

/// Runtime flags of a type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u32);

impl TypeFlags {
    /// Node lies inside a period group.
    pub const PE: Self = Self(1 << 0);
    /// Node lies inside, or is, a multiple field.
    pub const MU: Self = Self(1 << 1);
    /// Subtree must be enumerated field by field.
    pub const ATOMIC_FB: Self = Self(1 << 2);
    /// Per-occurrence child of a multiple field.
    pub const MU_GHOST: Self = Self(1 << 3);
    /// Staging marker during restriction.
    pub const TO_BE_REMOVED: Self = Self(1 << 4);
    /// Needs a second round trip to populate.
    pub const SECOND_CALL: Self = Self(1 << 5);
    /// Materialized as `@name` reference.
    pub const REFERENCE: Self = Self(1 << 6);
    /// Not settable.
    pub const READ_ONLY: Self = Self(1 << 7);
    /// Length prefix not part of the payload.
    pub const LENGTH_NOT_INCLUDED: Self = Self(1 << 8);
    /// Structure requested only partially.
    pub const PART: Self = Self(1 << 9);
    /// Range collapses to one occurrence.
    pub const SINGLE_INDEX: Self = Self(1 << 10);
    /// Length field reports a PE/MU occurrence count.
    pub const LENGTH_PE: Self = Self(1 << 11);

    /// No flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set flags.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear flags.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── FieldOptions ───────────────────────────────────────────────────

/// FDT field options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldOptions(u32);

const OPTION_CODES: &[(FieldOptions, &str)] = &[
    (FieldOptions::UQ, "UQ"),
    (FieldOptions::NU, "NU"),
    (FieldOptions::FI, "FI"),
    (FieldOptions::DE, "DE"),
    (FieldOptions::NC, "NC"),
    (FieldOptions::NN, "NN"),
    (FieldOptions::HF, "HF"),
    (FieldOptions::NV, "NV"),
    (FieldOptions::NB, "NB"),
    (FieldOptions::HE, "HE"),
    (FieldOptions::PE, "PE"),
    (FieldOptions::MU, "MU"),
    (FieldOptions::LA, "LA"),
    (FieldOptions::LB, "LB"),
    (FieldOptions::CE, "CE"),
];

impl FieldOptions {
    /// Unique descriptor.
    pub const UQ: Self = Self(1 << 0);
    /// Null suppressed.
    pub const NU: Self = Self(1 << 1);
    /// Fixed storage.
    pub const FI: Self = Self(1 << 2);
    /// Descriptor.
    pub const DE: Self = Self(1 << 3);
    /// SQL null value.
    pub const NC: Self = Self(1 << 4);
    /// Not null.
    pub const NN: Self = Self(1 << 5);
    /// High-order first.
    pub const HF: Self = Self(1 << 6);
    /// Null value.
    pub const NV: Self = Self(1 << 7);
    /// Null byte.
    pub const NB: Self = Self(1 << 8);
    /// Hyper exit.
    pub const HE: Self = Self(1 << 9);
    /// Period group.
    pub const PE: Self = Self(1 << 10);
    /// Multiple field.
    pub const MU: Self = Self(1 << 11);
    /// Large alpha.
    pub const LA: Self = Self(1 << 12);
    /// Large object.
    pub const LB: Self = Self(1 << 13);
    /// Collation exit.
    pub const CE: Self = Self(1 << 14);

    /// No options.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Option for a two-letter FDT code.
    pub fn from_code(code: &str) -> Option<Self> {
        OPTION_CODES
            .iter()
            .find(|(_, c)| c.eq_ignore_ascii_case(code))
            .map(|(o, _)| *o)
    }

    /// Whether every option in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set options.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Whether no option is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Two-letter codes of all set options, in FDT order.
    pub fn codes(self) -> Vec<&'static str> {
        OPTION_CODES
            .iter()
            .filter(|(o, _)| self.contains(*o))
            .map(|(_, c)| *c)
            .collect()
    }
}

impl std::ops::BitOr for FieldOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for FieldOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.codes().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_field_type() {
        assert_eq!(FieldKind::evaluate('A', 1).unwrap(), FieldKind::Byte);
        assert_eq!(FieldKind::evaluate('A', 20).unwrap(), FieldKind::String);
        assert_eq!(FieldKind::evaluate('W', 2).unwrap(), FieldKind::Unicode);
        assert_eq!(FieldKind::evaluate('B', 4).unwrap(), FieldKind::UInt4);
        assert_eq!(FieldKind::evaluate('B', 3).unwrap(), FieldKind::ByteArray);
        assert_eq!(FieldKind::evaluate('F', 8).unwrap(), FieldKind::Int8);
        assert_eq!(FieldKind::evaluate('P', 7).unwrap(), FieldKind::Packed);
        assert_eq!(FieldKind::evaluate('U', 3).unwrap(), FieldKind::Unpacked);
        assert_eq!(FieldKind::evaluate('G', 8).unwrap(), FieldKind::Float);
        assert!(matches!(
            FieldKind::evaluate('X', 1),
            Err(AdaError::InvalidFormatCharacter { format: 'X', .. })
        ));
    }

    #[test]
    fn test_format_character() {
        assert_eq!(FieldKind::UInt4.format_character(), 'B');
        assert_eq!(FieldKind::Int2.format_character(), 'F');
        assert_eq!(FieldKind::LBString.format_character(), 'A');
        assert_eq!(FieldKind::LAUnicode.format_character(), 'W');
        assert_eq!(FieldKind::Group.format_character(), ' ');
    }

    #[test]
    fn test_flags() {
        let mut flags = TypeFlags::PE | TypeFlags::PART;
        assert!(flags.contains(TypeFlags::PE));
        flags.remove(TypeFlags::PE);
        assert!(!flags.contains(TypeFlags::PE));
        assert!(flags.contains(TypeFlags::PART));
    }

    #[test]
    fn test_options_codes() {
        let mut options = FieldOptions::from_code("uq").unwrap();
        options.insert(FieldOptions::DE);
        options.insert(FieldOptions::MU);
        assert_eq!(options.to_string(), "UQ,DE,MU");
        assert!(FieldOptions::from_code("ZZ").is_none());
    }
}
