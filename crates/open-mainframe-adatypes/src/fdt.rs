//! FDT type model.
//!
//! Field and structure types live in a [`TypeTree`] arena; parents and
//! children are [`TypeId`] indices. Nodes are shared as `Arc<AdaType>` so
//! values can hold a snapshot of their type without borrowing the tree.

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::Endian;
use crate::charset::Charset;
use crate::kind::{FieldKind, FieldOptions, TypeFlags};
use crate::range::{AdaRange, PartialRange};
use crate::{AdaError, Result};

/// Reference field index meaning "no reference field".
pub const NO_REFERENCE_FIELD: i32 = i32::MAX;

/// Byte arrays are limited to this length.
pub const MAX_BYTE_ARRAY_LENGTH: u32 = 126;

// ── Occurrence & condition ─────────────────────────────────────────

/// How a structure finds its occurrence count in the record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    /// 4-byte unsigned counter (PE and MU).
    Capacity,
    /// 1-byte counter.
    ByteCount,
    /// 2-byte counter.
    UInt2,
    /// Exactly one occurrence.
    Single,
    /// Occurrences until the buffer is exhausted.
    None,
    /// Fixed number of occurrences.
    Fixed(u32),
}

/// Parser condition of a structure whose children depend on a reference byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCondition {
    /// Child holding the byte length of one element, `-1` for none.
    pub length_field_index: i32,
    /// Child whose value selects the matrix row, [`NO_REFERENCE_FIELD`] for none.
    pub ref_field_index: i32,
    /// Reference value to the additional child indices to parse.
    pub matrix: HashMap<u8, Vec<usize>>,
}

impl FieldCondition {
    /// Condition with length and reference field.
    pub fn new(length_field_index: i32, ref_field_index: i32) -> Self {
        Self {
            length_field_index,
            ref_field_index,
            matrix: HashMap::new(),
        }
    }

    /// Builder: add a matrix row.
    pub fn with_row(mut self, value: u8, children: Vec<usize>) -> Self {
        self.matrix.insert(value, children);
        self
    }
}

// ── Descriptor details ─────────────────────────────────────────────

/// Slice of a parent field used by a super or sub descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperEntry {
    /// Short name of the parent field.
    pub name: String,
    /// First byte, 1-based.
    pub from: u16,
    /// Last byte, inclusive.
    pub to: u16,
    /// Kind of the parent field, resolved against the definition.
    pub kind: Option<FieldKind>,
}

impl SuperEntry {
    /// Entry over bytes `from..=to` of `name`.
    pub fn new(name: impl Into<String>, from: u16, to: u16) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            kind: None,
        }
    }

    /// Width of the slice.
    pub fn width(&self) -> u32 {
        u32::from(self.to.saturating_sub(self.from)) + 1
    }
}

/// Kind specific metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeDetail {
    /// Nothing beyond the common attributes.
    #[default]
    None,
    /// Super or sub descriptor entries.
    SuperDesc {
        /// Parent slices in FDT order.
        entries: Vec<SuperEntry>,
    },
    /// Phonetic descriptor.
    Phonetic {
        /// Parent field.
        parent: String,
        /// Descriptor length.
        descriptor_length: u16,
    },
    /// Collation descriptor.
    Collation {
        /// Parent field.
        parent: String,
        /// Collation attribute.
        attribute: String,
    },
    /// Hyper descriptor.
    HyperExit {
        /// FDT format character.
        format: char,
        /// Exit number.
        exit: u8,
        /// Parent fields.
        parents: Vec<String>,
    },
    /// Referential integrity constraint.
    Referential {
        /// Referenced file.
        file: u32,
        /// Primary key in the referenced file.
        primary_key: String,
        /// Foreign key in this file.
        foreign_key: String,
        /// Update action: 0 none, 1 cascade, 2 nullify.
        update_action: u8,
        /// Delete action: 0 none, 1 cascade, 2 nullify.
        delete_action: u8,
    },
    /// Redefinition of a leaf into sub fields.
    Redefinition {
        /// The redefined field.
        main: Box<AdaType>,
        /// Sub fields covering the main field's bytes.
        fields: Vec<AdaType>,
    },
}

// ── AdaType ────────────────────────────────────────────────────────

/// One node of the FDT tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaType {
    name: String,
    short_name: String,
    kind: FieldKind,
    length: u32,
    level: u8,
    flags: TypeFlags,
    options: FieldOptions,
    fractional: u32,
    pe_range: AdaRange,
    mu_range: AdaRange,
    partial_range: Option<PartialRange>,
    endian: Endian,
    charset: Option<Charset>,
    occurrence: Occurrence,
    condition: Option<FieldCondition>,
    detail: TypeDetail,
}

impl AdaType {
    /// Type with the kind's default length.
    pub fn new(kind: FieldKind, name: impl Into<String>) -> Self {
        Self::with_length(kind, name, kind.default_length())
    }

    /// Type with an explicit length.
    ///
    /// Byte arrays are capped at [`MAX_BYTE_ARRAY_LENGTH`].
    pub fn with_length(kind: FieldKind, name: impl Into<String>, length: u32) -> Self {
        let name = name.into();
        let length = if kind == FieldKind::ByteArray {
            length.min(MAX_BYTE_ARRAY_LENGTH)
        } else {
            length
        };
        let mut flags = TypeFlags::empty();
        let mut occurrence = Occurrence::Single;
        let mut pe_range = AdaRange::empty();
        let mut mu_range = AdaRange::empty();
        match kind {
            FieldKind::PeriodGroup => {
                flags.insert(TypeFlags::PE);
                occurrence = Occurrence::Capacity;
                pe_range = AdaRange::all();
            }
            FieldKind::MultipleField => {
                flags.insert(TypeFlags::MU);
                occurrence = Occurrence::Capacity;
                mu_range = AdaRange::all();
            }
            k if k.is_special_descriptor() => flags.insert(TypeFlags::READ_ONLY),
            _ => {}
        }
        Self {
            short_name: name.clone(),
            name,
            kind,
            length,
            level: 1,
            flags,
            options: FieldOptions::empty(),
            fractional: 0,
            pe_range,
            mu_range,
            partial_range: None,
            endian: Endian::native(),
            charset: None,
            occurrence,
            condition: None,
            detail: TypeDetail::None,
        }
    }

    /// Structure type (group, PE, MU or generic structure).
    pub fn structure(kind: FieldKind, name: impl Into<String>) -> Self {
        Self::with_length(kind, name, 0)
    }

    /// Generic structure driven by a parser condition.
    pub fn with_condition(name: impl Into<String>, condition: FieldCondition) -> Self {
        let mut ty = Self::structure(FieldKind::Structure, name);
        ty.condition = Some(condition);
        ty.occurrence = Occurrence::None;
        ty
    }

    /// Type from an FDT format character and length.
    pub fn from_format(name: impl Into<String>, format: char, length: u32) -> Result<Self> {
        let name = name.into();
        let kind = FieldKind::evaluate(format, length).map_err(|_| {
            AdaError::InvalidFormatCharacter {
                format,
                name: name.clone(),
            }
        })?;
        if kind == FieldKind::Float && length != 4 && length != 8 {
            return Err(AdaError::InvalidFloatLength { length, name });
        }
        Ok(Self::with_length(kind, name, length))
    }

    /// Super or sub descriptor; the length is the sum of entry widths.
    pub fn super_desc(name: impl Into<String>, entries: Vec<SuperEntry>) -> Self {
        let length = entries.iter().map(SuperEntry::width).sum();
        let mut ty = Self::with_length(FieldKind::SuperDesc, name, length);
        ty.detail = TypeDetail::SuperDesc { entries };
        ty
    }

    /// Phonetic descriptor over `parent`.
    pub fn phonetic(name: impl Into<String>, descriptor_length: u16, parent: impl Into<String>) -> Self {
        let mut ty = Self::new(FieldKind::Phonetic, name);
        ty.detail = TypeDetail::Phonetic {
            parent: parent.into(),
            descriptor_length,
        };
        ty
    }

    /// Collation descriptor over `parent`.
    pub fn collation(
        name: impl Into<String>,
        length: u32,
        parent: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        let mut ty = Self::with_length(FieldKind::Collation, name, length);
        ty.detail = TypeDetail::Collation {
            parent: parent.into(),
            attribute: attribute.into(),
        };
        ty
    }

    /// Hyper descriptor fed by user exit `exit`.
    pub fn hyper_exit(
        name: impl Into<String>,
        length: u32,
        format: char,
        exit: u8,
        parents: Vec<String>,
    ) -> Self {
        let mut ty = Self::with_length(FieldKind::HyperDesc, name, length);
        ty.detail = TypeDetail::HyperExit {
            format,
            exit,
            parents,
        };
        ty
    }

    /// Referential integrity constraint.
    pub fn referential(
        name: impl Into<String>,
        file: u32,
        primary_key: impl Into<String>,
        foreign_key: impl Into<String>,
        update_action: u8,
        delete_action: u8,
    ) -> Self {
        let mut ty = Self::new(FieldKind::Referential, name);
        ty.detail = TypeDetail::Referential {
            file,
            primary_key: primary_key.into(),
            foreign_key: foreign_key.into(),
            update_action,
            delete_action,
        };
        ty
    }

    /// Redefinition of `main` into `fields`; widths must add up to the main length.
    pub fn redefinition(main: AdaType, fields: Vec<AdaType>) -> Result<Self> {
        let total: u32 = fields.iter().map(AdaType::length).sum();
        if main.is_structure() || main.length() == 0 || total != main.length() {
            return Err(AdaError::RedefinitionReplaceFailed {
                original: main.name().to_string(),
                replacement: fields
                    .iter()
                    .map(AdaType::name)
                    .collect::<Vec<_>>()
                    .join(","),
            });
        }
        let mut ty = Self::with_length(FieldKind::Redefinition, main.name(), main.length());
        ty.short_name = main.short_name.clone();
        ty.level = main.level;
        ty.flags = main.flags;
        ty.pe_range = main.pe_range;
        ty.mu_range = main.mu_range;
        ty.detail = TypeDetail::Redefinition {
            main: Box::new(main),
            fields,
        };
        Ok(ty)
    }

    // ── Builders ──

    /// Builder: short name.
    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    /// Builder: fractional digits.
    pub fn with_fractional(mut self, fractional: u32) -> Self {
        self.fractional = fractional;
        self
    }

    /// Builder: endian override.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Builder: wire charset.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    /// Builder: FDT option.
    pub fn with_option(mut self, option: FieldOptions) -> Self {
        self.add_option(option);
        self
    }

    /// Builder: occurrence rule.
    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    // ── Accessors ──

    /// Long name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Two-character short name.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Declared length, 0 for variable.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Set the length without flag propagation, see [`TypeTree::set_length`].
    pub fn set_length(&mut self, length: u32) {
        if self.kind != FieldKind::SuperDesc {
            self.length = length;
        }
    }

    /// Depth in the tree, 1 for top-level fields.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Byte order of binary payloads.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Runtime flags.
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Whether `flag` is set.
    pub fn has_flag(&self, flag: TypeFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Set a flag on this node only.
    pub fn add_flag(&mut self, flag: TypeFlags) {
        self.flags.insert(flag);
    }

    /// Clear a flag on this node only.
    pub fn remove_flag(&mut self, flag: TypeFlags) {
        self.flags.remove(flag);
    }

    /// FDT options.
    pub fn options(&self) -> FieldOptions {
        self.options
    }

    /// Whether `option` is set.
    pub fn has_option(&self, option: FieldOptions) -> bool {
        self.options.contains(option)
    }

    /// Add an FDT option; `HF` switches the endian to big.
    pub fn add_option(&mut self, option: FieldOptions) {
        self.options.insert(option);
        if option.contains(FieldOptions::HF) {
            self.endian = Endian::Big;
        }
    }

    /// Fractional digits of packed and unpacked fields.
    pub fn fractional(&self) -> u32 {
        self.fractional
    }

    /// Period group range.
    pub fn pe_range(&self) -> AdaRange {
        self.pe_range
    }

    /// Set the period group range.
    pub fn set_pe_range(&mut self, range: AdaRange) {
        self.pe_range = range;
    }

    /// Multiple field range.
    pub fn mu_range(&self) -> AdaRange {
        self.mu_range
    }

    /// Set the multiple field range.
    pub fn set_mu_range(&mut self, range: AdaRange) {
        self.mu_range = range;
    }

    /// Partial byte range.
    pub fn partial_range(&self) -> Option<PartialRange> {
        self.partial_range
    }

    /// Set the partial byte range.
    pub fn set_partial_range(&mut self, range: Option<PartialRange>) {
        self.partial_range = range;
    }

    /// Wire charset of alpha fields.
    pub fn charset(&self) -> Option<Charset> {
        self.charset
    }

    /// Occurrence rule of structures.
    pub fn occurrence(&self) -> Occurrence {
        self.occurrence
    }

    /// Parser condition of structures.
    pub fn condition(&self) -> Option<&FieldCondition> {
        self.condition.as_ref()
    }

    /// Kind specific metadata.
    pub fn detail(&self) -> &TypeDetail {
        &self.detail
    }

    /// Mutable kind specific metadata.
    pub fn detail_mut(&mut self) -> &mut TypeDetail {
        &mut self.detail
    }

    /// Format character; redefinitions use their main field's.
    pub fn format_character(&self) -> char {
        match &self.detail {
            TypeDetail::Redefinition { main, .. } => main.format_character(),
            _ => self.kind.format_character(),
        }
    }

    /// Composite type.
    pub fn is_structure(&self) -> bool {
        self.kind.is_structure()
    }

    /// Descriptor kinds, including super descriptors.
    pub fn is_special_descriptor(&self) -> bool {
        self.kind.is_special_descriptor()
    }

    /// Leaf inside a period group or multiple field.
    pub fn is_periodic_or_multiple(&self) -> bool {
        self.has_flag(TypeFlags::PE) || self.has_flag(TypeFlags::MU)
    }

    /// Check a declared length against the super descriptor entries.
    pub fn validate_super_length(&self, declared: u32) -> Result<()> {
        if self.kind == FieldKind::SuperDesc && declared != 0 && declared != self.length {
            return Err(AdaError::SuperDescLengthMismatch {
                name: self.name.clone(),
                declared,
                computed: self.length,
            });
        }
        Ok(())
    }

    fn option_suffix(&self) -> String {
        if self.options.is_empty() {
            String::new()
        } else {
            format!(",{}", self.options)
        }
    }
}

impl std::fmt::Display for AdaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indent = " ".repeat(usize::from(self.level));
        match &self.detail {
            TypeDetail::SuperDesc { entries } => {
                if self.short_name == self.name {
                    write!(f, "{}=", self.short_name)?;
                } else {
                    write!(f, "{}[{}] =", self.name, self.short_name)?;
                }
                let parts: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{}({},{})", e.name, e.from, e.to))
                    .collect();
                write!(f, "{} ; {}", parts.join(","), self.name)
            }
            TypeDetail::Phonetic { parent, .. } => {
                write!(f, "{}=PHON({}) ; {}", self.short_name, parent, self.name)
            }
            TypeDetail::Collation { parent, attribute } => {
                let option = if self.has_option(FieldOptions::UQ) {
                    ",UQ"
                } else if self.has_option(FieldOptions::HE) {
                    ",HE"
                } else if self.has_option(FieldOptions::LA) {
                    ",LA"
                } else if self.has_option(FieldOptions::LB) {
                    ",L4"
                } else {
                    ""
                };
                write!(
                    f,
                    "{}{}=COLLATING({},{}) ; {}",
                    self.short_name, option, parent, attribute, self.name
                )
            }
            TypeDetail::HyperExit {
                format,
                exit,
                parents,
            } => write!(
                f,
                "{} {} {}{}=HYPER({},{}) ; {}",
                self.short_name,
                self.length,
                format,
                self.option_suffix(),
                exit,
                parents.join(","),
                self.name
            ),
            TypeDetail::Referential {
                file,
                primary_key,
                foreign_key,
                update_action,
                delete_action,
            } => {
                let delete = match delete_action {
                    1 => "/DC",
                    2 => "/DN",
                    _ => "/DX",
                };
                let update = match update_action {
                    1 => ",UC",
                    2 => ",UN",
                    _ => ",UX",
                };
                write!(
                    f,
                    "{}=REFINT({},{},{}{}{}) ; {}",
                    self.short_name, foreign_key, file, primary_key, delete, update, self.name
                )
            }
            TypeDetail::Redefinition { main, fields } => {
                write!(f, "{main} REDEFINE(")?;
                let names: Vec<&str> = fields.iter().map(AdaType::short_name).collect();
                write!(f, "{})", names.join(","))
            }
            TypeDetail::None if self.is_structure() => write!(
                f,
                "{}{}, {}{} ; {}",
                indent,
                self.level,
                self.short_name,
                self.option_suffix(),
                self.name
            ),
            TypeDetail::None => write!(
                f,
                "{}{}, {}, {}, {}{} ; {}",
                indent,
                self.level,
                self.short_name,
                self.length,
                self.format_character(),
                self.option_suffix(),
                self.name
            ),
        }
    }
}

// ── TypeTree ───────────────────────────────────────────────────────

/// Index of a node in a [`TypeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone)]
struct TypeNode {
    ty: Arc<AdaType>,
    parent: Option<TypeId>,
    children: Vec<TypeId>,
}

/// Arena of type nodes with an unnamed root structure at [`TypeTree::ROOT`].
#[derive(Debug, Clone)]
pub struct TypeTree {
    nodes: Vec<TypeNode>,
}

impl Default for TypeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTree {
    /// The root structure.
    pub const ROOT: TypeId = TypeId(0);

    /// Tree holding only the root.
    pub fn new() -> Self {
        let mut root = AdaType::structure(FieldKind::Structure, "");
        root.level = 0;
        Self {
            nodes: vec![TypeNode {
                ty: Arc::new(root),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Type of node `id`.
    pub fn get(&self, id: TypeId) -> &AdaType {
        &self.nodes[id.0].ty
    }

    /// Shared handle of node `id`.
    pub fn arc(&self, id: TypeId) -> Arc<AdaType> {
        Arc::clone(&self.nodes[id.0].ty)
    }

    /// Mutable type of node `id`; clones if shared with values.
    pub fn get_mut(&mut self, id: TypeId) -> &mut AdaType {
        Arc::make_mut(&mut self.nodes[id.0].ty)
    }

    /// Parent of `id`; `None` for the root.
    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.nodes[id.0].parent
    }

    /// Children of `id` in declaration order.
    pub fn children(&self, id: TypeId) -> &[TypeId] {
        &self.nodes[id.0].children
    }

    /// Ancestors of `id` from the parent upwards, root excluded.
    pub fn ancestors(&self, id: TypeId) -> Vec<TypeId> {
        let mut list = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == Self::ROOT {
                break;
            }
            list.push(p);
            current = self.parent(p);
        }
        list
    }

    /// Add `ty` as last child of `parent`.
    pub fn add(&mut self, parent: TypeId, ty: AdaType) -> TypeId {
        let index = self.children(parent).len();
        self.insert(parent, index, ty)
    }

    /// Insert `ty` as child `index` of `parent`, inheriting parent flags.
    pub fn insert(&mut self, parent: TypeId, index: usize, mut ty: AdaType) -> TypeId {
        let parent_ty = self.get(parent);
        ty.level = parent_ty.level.saturating_add(1);
        if parent_ty.has_flag(TypeFlags::PE) {
            ty.add_flag(TypeFlags::PE);
            if ty.pe_range.is_empty() {
                ty.pe_range = parent_ty.pe_range;
            }
        }
        if parent_ty.kind() == FieldKind::MultipleField {
            ty.add_flag(TypeFlags::MU | TypeFlags::MU_GHOST);
            if ty.mu_range.is_empty() {
                ty.mu_range = parent_ty.mu_range;
            }
        }
        if ty.kind() == FieldKind::MultipleField && ty.has_flag(TypeFlags::PE) {
            ty.add_flag(TypeFlags::ATOMIC_FB);
        }
        let propagate_atomic = ty.has_flag(TypeFlags::ATOMIC_FB);
        let id = TypeId(self.nodes.len());
        self.nodes.push(TypeNode {
            ty: Arc::new(ty),
            parent: Some(parent),
            children: Vec::new(),
        });
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, id);
        if propagate_atomic {
            self.propagate_up(id, TypeFlags::ATOMIC_FB);
        }
        id
    }

    /// Detach `id` from its parent; the node stays in the arena unreachable.
    pub fn detach(&mut self, id: TypeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Replace the type of `id`, keeping its position and children.
    pub fn replace(&mut self, id: TypeId, mut ty: AdaType) {
        ty.level = self.get(id).level;
        self.nodes[id.0].ty = Arc::new(ty);
    }

    /// Set a flag with propagation: `AtomicFB` and `SingleIndex` climb to the
    /// ancestors, `AtomicFB` also descends to the children.
    pub fn add_flag(&mut self, id: TypeId, flag: TypeFlags) {
        if self.get(id).has_flag(flag) {
            return;
        }
        self.get_mut(id).add_flag(flag);
        if flag == TypeFlags::ATOMIC_FB || flag == TypeFlags::SINGLE_INDEX {
            self.propagate_up(id, flag);
        }
        if flag == TypeFlags::ATOMIC_FB {
            let children = self.children(id).to_vec();
            for child in children {
                self.add_flag(child, flag);
            }
        }
    }

    fn propagate_up(&mut self, id: TypeId, flag: TypeFlags) {
        for ancestor in self.ancestors(id) {
            if self.get(ancestor).has_flag(flag) {
                break;
            }
            self.get_mut(ancestor).add_flag(flag);
        }
    }

    /// Set the length; a PE leaf switches its subtree to atomic format buffers.
    pub fn set_length(&mut self, id: TypeId, length: u32) {
        self.get_mut(id).set_length(length);
        let ty = self.get(id);
        if ty.has_flag(TypeFlags::PE) && !ty.is_structure() {
            self.add_flag(id, TypeFlags::ATOMIC_FB);
        }
    }

    /// Node ids of the subtree below `start` in preorder, `start` excluded.
    pub fn preorder(&self, start: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut stack: Vec<TypeId> = self.children(start).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// First node in preorder whose long or short name is `name`.
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.preorder(Self::ROOT)
            .into_iter()
            .find(|id| self.get(*id).name() == name || self.get(*id).short_name() == name)
    }

    /// Whether the subtree below `id` contains a node of `kind`.
    pub fn contains_kind(&self, id: TypeId, kind: FieldKind) -> bool {
        self.preorder(id)
            .into_iter()
            .any(|c| self.get(c).kind() == kind)
    }

    /// Leaves below `id` in preorder.
    pub fn leaves(&self, id: TypeId) -> Vec<TypeId> {
        self.preorder(id)
            .into_iter()
            .filter(|c| !self.get(*c).is_structure())
            .collect()
    }

    /// Sum of fixed child widths, used for mainframe zero-occurrence padding.
    ///
    /// MU occurrences inside a period group arrive with the second call and
    /// references occupy no bytes, so neither counts.
    pub fn fixed_width(&self, id: TypeId) -> u32 {
        self.leaves(id)
            .into_iter()
            .map(|c| self.get(c))
            .filter(|ty| {
                !ty.has_flag(TypeFlags::REFERENCE)
                    && !(ty.has_flag(TypeFlags::MU_GHOST) && ty.has_flag(TypeFlags::PE))
            })
            .map(AdaType::length)
            .sum()
    }

    /// One-line FDT description of node `id`.
    pub fn describe(&self, id: TypeId) -> String {
        let ty = self.get(id);
        if ty.kind() == FieldKind::MultipleField {
            let indent = " ".repeat(usize::from(ty.level()));
            return match self.children(id).first() {
                Some(child) => {
                    let child = self.get(*child);
                    format!(
                        "{}{}, {}, {}, {},MU{} ; {}",
                        indent,
                        ty.level(),
                        ty.short_name(),
                        child.length(),
                        child.format_character(),
                        child.option_suffix(),
                        ty.name()
                    )
                }
                None => format!("{}{} {} deleted", indent, ty.level(), ty.short_name()),
            };
        }
        ty.to_string()
    }

    /// Multi-line dump of the whole tree.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut skip_below: Option<TypeId> = None;
        for id in self.preorder(Self::ROOT) {
            if let Some(mu) = skip_below {
                if self.parent(id) == Some(mu) {
                    continue;
                }
                skip_below = None;
            }
            if self.get(id).kind() == FieldKind::MultipleField {
                skip_below = Some(id);
            }
            out.push_str(&self.describe(id));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_tree() -> (TypeTree, TypeId, TypeId) {
        let mut tree = TypeTree::new();
        tree.add(TypeTree::ROOT, AdaType::new(FieldKind::UInt4, "U4"));
        let pe = tree.add(TypeTree::ROOT, AdaType::structure(FieldKind::PeriodGroup, "PG"));
        tree.add(pe, AdaType::new(FieldKind::Character, "GC"));
        let mu = tree.add(pe, AdaType::structure(FieldKind::MultipleField, "GM"));
        let ghost = tree.add(mu, AdaType::with_length(FieldKind::Packed, "GM", 5));
        (tree, pe, ghost)
    }

    #[test]
    fn test_flag_inheritance() {
        let (tree, pe, ghost) = period_tree();
        let ty = tree.get(ghost);
        assert!(ty.has_flag(TypeFlags::PE));
        assert!(ty.has_flag(TypeFlags::MU_GHOST));
        assert_eq!(ty.level(), 3);
        assert_eq!(ty.pe_range(), AdaRange::all());
        assert_eq!(ty.mu_range(), AdaRange::all());
        assert!(tree.get(pe).has_flag(TypeFlags::ATOMIC_FB));
        assert!(tree.contains_kind(pe, FieldKind::MultipleField));
    }

    #[test]
    fn test_set_length_marks_atomic() {
        let mut tree = TypeTree::new();
        let pe = tree.add(TypeTree::ROOT, AdaType::structure(FieldKind::PeriodGroup, "PG"));
        let gs = tree.add(pe, AdaType::new(FieldKind::String, "GS"));
        assert!(!tree.get(pe).has_flag(TypeFlags::ATOMIC_FB));
        tree.set_length(gs, 10);
        assert!(tree.get(gs).has_flag(TypeFlags::ATOMIC_FB));
        assert!(tree.get(pe).has_flag(TypeFlags::ATOMIC_FB));
    }

    #[test]
    fn test_dump() {
        let (tree, _, _) = period_tree();
        let dump = tree.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], " 1, U4, 4, B ; U4");
        assert_eq!(lines[1], " 1, PG ; PG");
        assert_eq!(lines[2], "  2, GC, 1, A ; GC");
        assert_eq!(lines[3], "  2, GM, 5, P,MU ; GM");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_descriptor_rendering() {
        let sp = AdaType::super_desc(
            "S1",
            vec![SuperEntry::new("AA", 1, 2), SuperEntry::new("BB", 3, 4)],
        );
        assert_eq!(sp.length(), 4);
        assert_eq!(sp.to_string(), "S1=AA(1,2),BB(3,4) ; S1");
        assert!(sp.validate_super_length(4).is_ok());
        assert!(matches!(
            sp.validate_super_length(6),
            Err(AdaError::SuperDescLengthMismatch { computed: 4, .. })
        ));

        assert_eq!(AdaType::phonetic("PH", 20, "AE").to_string(), "PH=PHON(AE) ; PH");
        let coll = AdaType::collation("CO", 10, "AE", "de@collation=phonebook")
            .with_option(FieldOptions::UQ);
        assert_eq!(coll.to_string(), "CO,UQ=COLLATING(AE,de@collation=phonebook) ; CO");
        let hyper = AdaType::hyper_exit("HY", 4, 'A', 1, vec!["AA".into(), "AB".into()]);
        assert_eq!(hyper.to_string(), "HY 4 A=HYPER(1,AA,AB) ; HY");
        let refint = AdaType::referential("RI", 12, "AA", "AB", 1, 0);
        assert_eq!(refint.to_string(), "RI=REFINT(AB,12,AA/DX,UC) ; RI");
    }

    #[test]
    fn test_from_format() {
        let ty = AdaType::from_format("AA", 'G', 8).unwrap();
        assert_eq!(ty.kind(), FieldKind::Float);
        assert!(matches!(
            AdaType::from_format("AB", 'G', 6),
            Err(AdaError::InvalidFloatLength { length: 6, .. })
        ));
        assert!(matches!(
            AdaType::from_format("AC", 'Z', 2),
            Err(AdaError::InvalidFormatCharacter { format: 'Z', .. })
        ));
    }

    #[test]
    fn test_byte_array_capped() {
        let ty = AdaType::with_length(FieldKind::ByteArray, "BA", 300);
        assert_eq!(ty.length(), MAX_BYTE_ARRAY_LENGTH);
    }

    #[test]
    fn test_redefinition_width_check() {
        let main = AdaType::with_length(FieldKind::String, "AA", 6);
        let ok = AdaType::redefinition(
            main.clone(),
            vec![
                AdaType::with_length(FieldKind::String, "A1", 2),
                AdaType::with_length(FieldKind::String, "A2", 4),
            ],
        );
        assert_eq!(ok.unwrap().format_character(), 'A');
        let bad = AdaType::redefinition(main, vec![AdaType::with_length(FieldKind::String, "A1", 2)]);
        assert!(matches!(bad, Err(AdaError::RedefinitionReplaceFailed { .. })));
    }
}
