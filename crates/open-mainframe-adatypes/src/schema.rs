//! TOML field definition schemas.
//!
//! A schema lists fields in FDT order. Hierarchy comes from the `level`
//! of each field, as in an FDT listing, or from nested `children` tables:
//!
//! ```toml
//! [[field]]
//! name = "AA"
//! format = "A"
//! length = 8
//! options = ["UQ", "DE"]
//!
//! [[field]]
//! name = "PG"
//! options = ["PE"]
//! children = [
//!     { name = "PA", format = "P", length = 5, fractional = 2 },
//!     { name = "PM", format = "A", length = 10, options = ["MU"] },
//! ]
//!
//! [[super_descriptor]]
//! name = "S1"
//! entries = [{ field = "AA", from = 1, to = 2 }]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::definition::Definition;
use crate::fdt::{AdaType, SuperEntry, TypeId, TypeTree};
use crate::kind::{FieldKind, FieldOptions};
use crate::{AdaError, Result};

/// Field definition table loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdtSchema {
    /// Fields in FDT order.
    #[serde(rename = "field")]
    pub fields: Vec<FieldSchema>,
    /// Super and sub descriptors.
    #[serde(rename = "super_descriptor")]
    pub super_descriptors: Vec<SuperSchema>,
    /// Phonetic descriptors.
    #[serde(rename = "phonetic")]
    pub phonetics: Vec<PhoneticSchema>,
}

/// One field of the schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Two-letter short name, defaults to `name`.
    pub short_name: Option<String>,
    /// FDT format character; blank or missing for groups.
    pub format: Option<char>,
    /// Length, 0 for variable.
    pub length: u32,
    /// FDT level, 0 to derive it from the nesting.
    pub level: u8,
    /// Two-letter FDT option codes.
    pub options: Vec<String>,
    /// Fractional digits of packed and unpacked fields.
    pub fractional: u32,
    /// Nested fields of a group or period group.
    pub children: Vec<FieldSchema>,
}

/// Super or sub descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperSchema {
    /// Descriptor name.
    pub name: String,
    /// Declared length, checked against the entries when set.
    pub length: Option<u32>,
    /// Parent slices.
    pub entries: Vec<SuperEntrySchema>,
}

/// Slice of a parent field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperEntrySchema {
    /// Parent short name.
    pub field: String,
    /// First byte, 1-based.
    pub from: u16,
    /// Last byte, inclusive.
    pub to: u16,
}

/// Phonetic descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneticSchema {
    /// Descriptor name.
    pub name: String,
    /// Parent field.
    pub parent: String,
    /// Descriptor length.
    pub length: u16,
}

fn schema_error(message: impl Into<String>) -> AdaError {
    AdaError::Schema {
        message: message.into(),
    }
}

impl FieldSchema {
    fn options(&self) -> Result<FieldOptions> {
        let mut options = FieldOptions::empty();
        for code in &self.options {
            let option = FieldOptions::from_code(code)
                .ok_or_else(|| schema_error(format!("unknown option '{code}' of field {}", self.name)))?;
            options.insert(option);
        }
        Ok(options)
    }

    fn kind(&self, options: FieldOptions) -> Result<Option<FieldKind>> {
        let format = match self.format {
            None | Some(' ') => return Ok(None),
            Some(format) => format.to_ascii_uppercase(),
        };
        let large = |la: FieldKind, lb: FieldKind, plain: FieldKind| {
            if options.contains(FieldOptions::LB) {
                lb
            } else if options.contains(FieldOptions::LA) {
                la
            } else {
                plain
            }
        };
        let kind = match format {
            'A' => large(FieldKind::LAString, FieldKind::LBString, FieldKind::String),
            'W' => large(FieldKind::LAUnicode, FieldKind::LBUnicode, FieldKind::Unicode),
            'G' if self.length != 4 && self.length != 8 => {
                return Err(AdaError::InvalidFloatLength {
                    length: self.length,
                    name: self.name.clone(),
                })
            }
            'G' if self.length == 8 => FieldKind::Double,
            _ => FieldKind::evaluate(format, self.length).map_err(|_| AdaError::InvalidFormatCharacter {
                format,
                name: self.name.clone(),
            })?,
        };
        Ok(Some(kind))
    }

    fn ada_type(&self) -> Result<(AdaType, bool)> {
        let options = self.options()?;
        let short_name = self.short_name.clone().unwrap_or_else(|| self.name.clone());
        let multiple = options.contains(FieldOptions::MU);
        let ty = match self.kind(options)? {
            None if options.contains(FieldOptions::PE) => {
                AdaType::structure(FieldKind::PeriodGroup, &self.name)
            }
            None => AdaType::structure(FieldKind::Group, &self.name),
            Some(kind) => AdaType::with_length(kind, &self.name, self.length)
                .with_fractional(self.fractional),
        };
        let multiple = multiple && !ty.is_structure();
        Ok((ty.with_short_name(short_name).with_option(options), multiple))
    }
}

impl FdtSchema {
    /// Parse a TOML schema.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| schema_error(e.to_string()))
    }

    /// Load a TOML schema file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| schema_error(format!("{}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| schema_error(format!("{}: {e}", path.display())))
    }

    /// Build a definition with the default configuration.
    pub fn to_definition(&self) -> Result<Definition> {
        self.to_definition_with(EngineConfig::default())
    }

    /// Build a definition using `config`.
    pub fn to_definition_with(&self, config: EngineConfig) -> Result<Definition> {
        let mut def = Definition::with_config(config);
        let mut stack: Vec<(u8, TypeId)> = Vec::new();
        for field in &self.fields {
            add_field(&mut def, &mut stack, field, 1)?;
        }
        for desc in &self.super_descriptors {
            let entries: Vec<SuperEntry> = desc
                .entries
                .iter()
                .map(|e| SuperEntry::new(&e.field, e.from, e.to))
                .collect();
            for entry in &entries {
                if def.search_type(&entry.name).is_none() {
                    return Err(schema_error(format!(
                        "super descriptor {} references unknown field {}",
                        desc.name, entry.name
                    )));
                }
            }
            let ty = AdaType::super_desc(&desc.name, entries);
            if let Some(length) = desc.length {
                ty.validate_super_length(length)?;
            }
            def.append(ty);
        }
        for phonetic in &self.phonetics {
            def.append(AdaType::phonetic(&phonetic.name, phonetic.length, &phonetic.parent));
        }
        def.init_references();
        debug!(
            fields = self.fields.len(),
            descriptors = self.super_descriptors.len() + self.phonetics.len(),
            "schema loaded"
        );
        Ok(def)
    }
}

/// Add `field` below the innermost open structure of a lower level.
fn add_field(def: &mut Definition, stack: &mut Vec<(u8, TypeId)>, field: &FieldSchema, default_level: u8) -> Result<()> {
    let level = if field.level == 0 { default_level } else { field.level };
    while stack.last().is_some_and(|(l, _)| *l >= level) {
        stack.pop();
    }
    let parent = stack.last().map_or(TypeTree::ROOT, |(_, id)| *id);
    let depth = stack.len() as u8 + 1;
    if level != depth {
        return Err(schema_error(format!(
            "field {} has level {level} but no parent at level {}",
            field.name,
            level - 1
        )));
    }
    let (ty, multiple) = field.ada_type()?;
    let structure = ty.is_structure();
    let id = if multiple {
        def.add_multiple(parent, ty)
    } else {
        def.add_child(parent, ty)
    };
    if structure {
        stack.push((level, id));
        for child in &field.children {
            add_field(def, stack, child, level + 1)?;
        }
    } else if !field.children.is_empty() {
        return Err(schema_error(format!("field {} with format has children", field.name)));
    }
    Ok(())
}
