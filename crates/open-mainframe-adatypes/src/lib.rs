#![forbid(unsafe_code)]
//! ADABAS field definition and buffer engine.
//!
//! This crate provides:
//!
//! - **Buffer Helper**: bounds-checked cursor over record buffers with endian control
//! - **Ranges**: PE/MU occurrence ranges with `N` (last) and `1-N` (all) forms
//! - **FDT Type Tree**: arena of field and structure types, flags, options, descriptors
//! - **Field Values**: typed payloads for every ADABAS format with wire encode/decode
//! - **Definition**: file tree, active tree, name lookups and the materialized value tree
//! - **Restriction Planner**: query strings like `AA,PE[1],MU[2,N],#AB,@AC,LB(1,100)`
//! - **Format Buffer Generator**: read, store and second-call format buffers
//! - **Record Buffer Parser**: PE/MU occurrence discovery, condition matrices, two-pass MU
//! - **Definition Cache**: process-wide FDT cache with an idle sweeper
//! - **Messages**: ADG error codes with localized catalog lookup

pub mod buffer;
pub mod cache;
pub mod charset;
pub mod config;
pub mod definition;
pub mod dump;
pub mod fdt;
pub mod format_buffer;
pub mod kind;
pub mod messages;
pub mod parser;
pub mod range;
pub mod restrict;
pub mod schema;
pub mod traverse;
pub mod value;

// ── Re-exports ─────────────────────────────────────────────────────

pub use buffer::{BufferHelper, Endian};
pub use cache::{DefinitionCache, SweeperHandle};
pub use charset::Charset;
pub use config::EngineConfig;
pub use definition::Definition;
pub use dump::format_bytes;
pub use fdt::{
    AdaType, FieldCondition, Occurrence, SuperEntry, TypeDetail, TypeId, TypeTree,
    NO_REFERENCE_FIELD,
};
pub use format_buffer::{FormatBufferRequest, RequestMode};
pub use kind::{FieldKind, FieldOptions, TypeFlags};
pub use parser::{BufferOption, SecondCall};
pub use range::{AdaRange, PartialRange};
pub use schema::FdtSchema;
pub use traverse::TraverseResult;
pub use value::{AdaValue, Element, FieldData, FieldValue, StructureValue, ValueInput};

// ── Error ──────────────────────────────────────────────────────────

/// Errors produced by the ADABAS type engine.
///
/// Every variant maps to a numeric `ADG` code, see [`AdaError::code`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AdaError {
    /// A read would pass the end of the record buffer.
    #[error("buffer overflow: {requested} bytes requested at offset {offset}, buffer length {max}")]
    BufferOverflow {
        /// Current cursor offset.
        offset: usize,
        /// Number of bytes requested.
        requested: usize,
        /// Buffer limit.
        max: usize,
    },

    /// Seek beyond the end of the record buffer.
    #[error("offset {offset} out of range, buffer length {max}")]
    OffsetOutOfRange {
        /// Requested offset.
        offset: usize,
        /// Buffer limit.
        max: usize,
    },

    /// A length-prefixed payload is shorter than its prefix claims.
    #[error("short payload for field '{name}': prefix {prefix} invalid")]
    ShortPayload {
        /// Field name.
        name: String,
        /// Raw length prefix.
        prefix: u32,
    },

    /// The stored value cannot be converted to the requested target.
    #[error("value of field '{name}' not representable as {target}")]
    NotRepresentable {
        /// Field name.
        name: String,
        /// Requested target type.
        target: String,
    },

    /// A numeric value does not fit into the field.
    #[error("value {value} does not fit into field '{name}' of length {length}")]
    RangeOverflow {
        /// Field name.
        name: String,
        /// Offending value.
        value: String,
        /// Field length in bytes.
        length: u32,
    },

    /// A negative value was assigned to an unsigned field.
    #[error("negative value {value} not allowed for unsigned field '{name}'")]
    NegativeUnsigned {
        /// Field name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// The declared length is not valid for the field kind.
    #[error("length {length} too large for {kind} field '{name}'")]
    LengthTooLargeForKind {
        /// Declared length.
        length: u32,
        /// Field kind name.
        kind: String,
        /// Field name.
        name: String,
    },

    /// A byte slice assigned to a fixed field has the wrong length.
    #[error("length {length} of input does not match field '{name}'")]
    LengthMismatch {
        /// Input length.
        length: usize,
        /// Field name.
        name: String,
    },

    /// The input kind cannot be assigned to the field.
    #[error("input of type {input} not valid for field '{name}'")]
    TypeMismatch {
        /// Input description.
        input: String,
        /// Field name.
        name: String,
    },

    /// A textual number could not be parsed.
    #[error("invalid number '{value}' for field '{name}'")]
    InvalidNumber {
        /// Field name.
        name: String,
        /// Input text.
        value: String,
    },

    /// Float fields must be 4 or 8 bytes.
    #[error("invalid float length {length} for field '{name}'")]
    InvalidFloatLength {
        /// Declared length.
        length: u32,
        /// Field name.
        name: String,
    },

    /// The kind has no value representation.
    #[error("field type {kind} of field '{name}' has no value")]
    UnsupportedKind {
        /// Field kind name.
        kind: String,
        /// Field name.
        name: String,
    },

    /// Format character outside the FDT alphabet.
    #[error("invalid format character '{format}' for field '{name}'")]
    InvalidFormatCharacter {
        /// The rejected character.
        format: char,
        /// Field name.
        name: String,
    },

    /// Super descriptor entries disagree with the declared length.
    #[error("super descriptor '{name}' declares length {declared} but entries sum to {computed}")]
    SuperDescLengthMismatch {
        /// Descriptor name.
        name: String,
        /// Declared length.
        declared: u32,
        /// Sum of entry widths.
        computed: u32,
    },

    /// Query names a field the definition does not contain.
    #[error("unknown field '{name}' in query")]
    UnknownField {
        /// Field name from the query.
        name: String,
    },

    /// Lookup of a field that is not part of the definition.
    #[error("no field {name} found in file definition")]
    FieldNotFound {
        /// Field name.
        name: String,
    },

    /// Query token does not match the field grammar.
    #[error("invalid query fragment '{fragment}'")]
    InvalidQuery {
        /// Offending token.
        fragment: String,
    },

    /// Operation needs a materialized value tree.
    #[error("no values available, create or parse values first")]
    NoValues,

    /// Condition matrix has no row for the reference value.
    #[error("no condition row for value {value} in structure '{name}'")]
    MissingConditionRow {
        /// Structure name.
        name: String,
        /// Reference field value.
        value: u8,
    },

    /// Occurrence counter exceeds the plausibility limit.
    #[error("implausible occurrence count {count} for field '{name}'")]
    ImplausibleOccurrence {
        /// Field name.
        name: String,
        /// Counter read from the buffer.
        count: u32,
    },

    /// Period group with zero length and no occurrence counter.
    #[error("period group '{name}' has length zero")]
    EmptyPeriodLengthZero {
        /// Field name.
        name: String,
    },

    /// Descriptor placeholders are read-only.
    #[error("descriptor '{name}' cannot be set")]
    DescriptorNotSettable {
        /// Descriptor name.
        name: String,
    },

    /// Field inside a period group addressed without an index.
    #[error("index required for period or multiple field '{name}'")]
    IndexRequiredForPE {
        /// Field name.
        name: String,
    },

    /// Index given for a field that is neither PE nor MU.
    #[error("index given on non-multiple field '{name}'")]
    IndexOnNonMultiple {
        /// Field name.
        name: String,
    },

    /// Addressed element is not present in the value tree.
    #[error("element {index} of field '{name}' not found")]
    ElementNotFound {
        /// Field name.
        name: String,
        /// Requested occurrence.
        index: u32,
    },

    /// Field is part of the definition but has no value.
    #[error("value of field '{name}' not found")]
    ValueNotFound {
        /// Field name.
        name: String,
    },

    /// Redefinition could not be swapped in for the original field.
    #[error("cannot replace field '{original}' with redefinition '{replacement}'")]
    RedefinitionReplaceFailed {
        /// Original field.
        original: String,
        /// Redefinition field.
        replacement: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// FDT schema error.
    #[error("schema error: {message}")]
    Schema {
        /// Description.
        message: String,
    },
}

impl AdaError {
    /// Numeric ADG code of the error.
    pub fn code(&self) -> u32 {
        match self {
            Self::Config { .. } => 2,
            Self::Schema { .. } => 3,
            Self::ShortPayload { .. } => 36,
            Self::DescriptorNotSettable { .. } => 37,
            Self::OffsetOutOfRange { .. } => 38,
            Self::BufferOverflow { .. } => 39,
            Self::FieldNotFound { .. } => 41,
            Self::InvalidFormatCharacter { .. } => 44,
            Self::SuperDescLengthMismatch { .. } => 45,
            Self::UnknownField { .. } => 50,
            Self::RangeOverflow { .. } => 57,
            Self::NoValues => 61,
            Self::ImplausibleOccurrence { .. } => 62,
            Self::EmptyPeriodLengthZero { .. } => 63,
            Self::MissingConditionRow { .. } => 81,
            Self::RedefinitionReplaceFailed { .. } => 93,
            Self::NegativeUnsigned { .. } => 101,
            Self::UnsupportedKind { .. } => 102,
            Self::TypeMismatch { .. } => 103,
            Self::LengthMismatch { .. } => 104,
            Self::NotRepresentable { .. } => 105,
            Self::InvalidNumber { .. } => 106,
            Self::InvalidFloatLength { .. } => 110,
            Self::LengthTooLargeForKind { .. } => 117,
            Self::IndexRequiredForPE { .. } => 121,
            Self::ElementNotFound { .. } => 123,
            Self::ValueNotFound { .. } => 124,
            Self::IndexOnNonMultiple { .. } => 126,
            Self::InvalidQuery { .. } => 129,
        }
    }

    /// Code rendered as `ADG%07d`.
    pub fn code_string(&self) -> String {
        messages::code_string(self.code())
    }

    /// Positional message arguments, substituted into catalog templates.
    pub fn arguments(&self) -> Vec<String> {
        match self {
            Self::BufferOverflow { offset, requested, max } => {
                vec![requested.to_string(), offset.to_string(), max.to_string()]
            }
            Self::OffsetOutOfRange { offset, max } => vec![offset.to_string(), max.to_string()],
            Self::ShortPayload { name, prefix } => vec![name.clone(), prefix.to_string()],
            Self::NotRepresentable { name, target } => vec![name.clone(), target.clone()],
            Self::RangeOverflow { name, value, length } => {
                vec![name.clone(), value.clone(), length.to_string()]
            }
            Self::NegativeUnsigned { name, value } | Self::InvalidNumber { name, value } => {
                vec![name.clone(), value.clone()]
            }
            Self::LengthTooLargeForKind { length, kind, name } => {
                vec![length.to_string(), kind.clone(), name.clone()]
            }
            Self::LengthMismatch { length, name } => vec![length.to_string(), name.clone()],
            Self::TypeMismatch { input, name } => vec![input.clone(), name.clone()],
            Self::InvalidFloatLength { length, name } => vec![length.to_string(), name.clone()],
            Self::UnsupportedKind { kind, name } => vec![kind.clone(), name.clone()],
            Self::InvalidFormatCharacter { format, name } => {
                vec![format.to_string(), name.clone()]
            }
            Self::SuperDescLengthMismatch { name, declared, computed } => {
                vec![name.clone(), declared.to_string(), computed.to_string()]
            }
            Self::UnknownField { name }
            | Self::FieldNotFound { name }
            | Self::EmptyPeriodLengthZero { name }
            | Self::DescriptorNotSettable { name }
            | Self::IndexRequiredForPE { name }
            | Self::IndexOnNonMultiple { name }
            | Self::ValueNotFound { name } => vec![name.clone()],
            Self::InvalidQuery { fragment } => vec![fragment.clone()],
            Self::NoValues => Vec::new(),
            Self::MissingConditionRow { name, value } => vec![name.clone(), value.to_string()],
            Self::ImplausibleOccurrence { name, count } => vec![name.clone(), count.to_string()],
            Self::ElementNotFound { name, index } => vec![name.clone(), index.to_string()],
            Self::RedefinitionReplaceFailed { original, replacement } => {
                vec![original.clone(), replacement.clone()]
            }
            Self::Config { message } | Self::Schema { message } => vec![message.clone()],
        }
    }

    /// Message in the given locale, prefixed with the ADG code.
    ///
    /// Falls back to English when the catalog has no entry.
    pub fn localized(&self, locale: &str) -> String {
        let text = messages::translate(locale, self.code(), &self.arguments())
            .unwrap_or_else(|| self.to_string());
        format!("{}: {}", self.code_string(), text)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdaError>;
