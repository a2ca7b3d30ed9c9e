//! Definition: file tree, active tree and the materialized value tree.
//!
//! The file tree is the full FDT. The active tree starts as a clone of it
//! and is replaced by the restriction planner; format buffers, parsing and
//! value creation only look at the active tree.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::fdt::{AdaType, TypeDetail, TypeId, TypeTree};
use crate::kind::{FieldKind, FieldOptions, TypeFlags};
use crate::parser::SecondCall;
use crate::traverse::{self, TraverseResult};
use crate::value::{AdaValue, FieldValue, StructureValue, ValueInput};
use crate::{AdaError, Result};

static VALUE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\]]+)(?:\[(\d+|N)\])?(?:\[(\d+|N)\])?$").expect("static value index regex")
});

/// FDT definition with its active restriction and values.
#[derive(Debug, Clone)]
pub struct Definition {
    file_tree: TypeTree,
    active: TypeTree,
    file_names: HashMap<String, TypeId>,
    active_names: HashMap<String, TypeId>,
    values: Option<Vec<AdaValue>>,
    config: EngineConfig,
    need_second_call: SecondCall,
    reference_prefix: String,
}

impl Default for Definition {
    fn default() -> Self {
        Self::new()
    }
}

impl Definition {
    /// Empty definition with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Empty definition using `config` for limits and block sizes.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            file_tree: TypeTree::new(),
            active: TypeTree::new(),
            file_names: HashMap::new(),
            active_names: HashMap::new(),
            values: None,
            config,
            need_second_call: SecondCall::None,
            reference_prefix: String::new(),
        }
    }

    /// Definition over an existing file tree; the active tree is a clone.
    pub fn from_tree(file_tree: TypeTree, config: EngineConfig) -> Self {
        let mut def = Self::with_config(config);
        def.file_tree = file_tree;
        def.reset_active();
        def
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the engine configuration.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Full FDT tree.
    pub fn file_tree(&self) -> &TypeTree {
        &self.file_tree
    }

    /// Tree of the current restriction.
    pub fn active_tree(&self) -> &TypeTree {
        &self.active
    }

    pub(crate) fn active_tree_mut(&mut self) -> &mut TypeTree {
        &mut self.active
    }

    pub(crate) fn set_active_tree(&mut self, tree: TypeTree) {
        self.active = tree;
        self.values = None;
        self.reindex();
    }

    /// Second call requirement left by the last parse or store.
    pub fn need_second_call(&self) -> SecondCall {
        self.need_second_call
    }

    pub(crate) fn set_need_second_call(&mut self, value: SecondCall) {
        self.need_second_call = value;
    }

    /// Prefix written into `@name` reference values.
    pub fn reference_prefix(&self) -> &str {
        &self.reference_prefix
    }

    /// Set the prefix written into `@name` reference values.
    pub fn set_reference_prefix(&mut self, prefix: impl Into<String>) {
        self.reference_prefix = prefix.into();
    }

    // ── Building ───────────────────────────────────────────────────

    fn register(names: &mut HashMap<String, TypeId>, ty: &AdaType, id: TypeId) {
        names.entry(ty.name().to_string()).or_insert(id);
        // length requests share the short name of the measured field
        if ty.kind() != FieldKind::FieldLength {
            names.entry(ty.short_name().to_string()).or_insert(id);
        }
    }

    fn index(tree: &TypeTree) -> HashMap<String, TypeId> {
        let mut names = HashMap::new();
        for id in tree.preorder(TypeTree::ROOT) {
            Self::register(&mut names, tree.get(id), id);
        }
        names
    }

    fn reindex(&mut self) {
        self.active_names = Self::index(&self.active);
    }

    /// Drop the restriction: the active tree becomes a clone of the file tree.
    pub fn reset_active(&mut self) {
        self.file_names = Self::index(&self.file_tree);
        self.active = self.file_tree.clone();
        self.active_names = self.file_names.clone();
        self.values = None;
    }

    /// Append a top-level field.
    pub fn append(&mut self, ty: AdaType) -> TypeId {
        self.add_child(TypeTree::ROOT, ty)
    }

    /// Add `ty` below `parent` in the file tree and drop any restriction.
    pub fn add_child(&mut self, parent: TypeId, ty: AdaType) -> TypeId {
        let id = self.file_tree.add(parent, ty);
        self.reset_active();
        id
    }

    /// Add a multiple field below `parent`; `leaf` describes one occurrence.
    pub fn add_multiple(&mut self, parent: TypeId, leaf: AdaType) -> TypeId {
        let mut mu = AdaType::structure(FieldKind::MultipleField, leaf.name())
            .with_short_name(leaf.short_name());
        mu.add_option(FieldOptions::MU);
        let id = self.file_tree.add(parent, mu);
        self.file_tree.add(id, leaf);
        self.reset_active();
        id
    }

    /// Resolve super descriptor entry kinds against the file tree.
    pub fn init_references(&mut self) {
        let kinds: HashMap<String, FieldKind> = self
            .file_tree
            .preorder(TypeTree::ROOT)
            .into_iter()
            .map(|id| {
                let ty = self.file_tree.get(id);
                (ty.short_name().to_string(), ty.kind())
            })
            .collect();
        for tree in [&mut self.file_tree, &mut self.active] {
            for id in tree.preorder(TypeTree::ROOT) {
                if !matches!(tree.get(id).detail(), TypeDetail::SuperDesc { .. }) {
                    continue;
                }
                if let TypeDetail::SuperDesc { entries } = tree.get_mut(id).detail_mut() {
                    for entry in entries.iter_mut() {
                        entry.kind = kinds.get(&entry.name).copied();
                    }
                }
            }
        }
    }

    /// Replace leaf `name` by a redefinition into `fields`.
    pub fn add_redefinition(&mut self, name: &str, fields: Vec<AdaType>) -> Result<()> {
        let id = self
            .file_names
            .get(name)
            .copied()
            .ok_or_else(|| AdaError::FieldNotFound {
                name: name.to_string(),
            })?;
        let main = self.file_tree.get(id).clone();
        let redefined = AdaType::redefinition(main, fields)?;
        self.file_tree.replace(id, redefined);
        self.reset_active();
        Ok(())
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// Active tree node for a long or short name.
    pub fn search_type_id(&self, name: &str) -> Option<TypeId> {
        self.active_names.get(name).copied()
    }

    /// Active type for a long or short name.
    pub fn search_type(&self, name: &str) -> Option<&AdaType> {
        self.search_type_id(name).map(|id| self.active.get(id))
    }

    pub(crate) fn search_file_type_id(&self, name: &str) -> Option<TypeId> {
        self.file_names.get(name).copied()
    }

    /// Rename a field in the active tree.
    pub fn adapt_name(&mut self, name: &str, new_name: &str) -> Result<()> {
        let id = self.search_type_id(name).ok_or_else(|| AdaError::FieldNotFound {
            name: name.to_string(),
        })?;
        self.active.get_mut(id).set_name(new_name);
        let mu_child = match self.active.get(id).kind() {
            FieldKind::MultipleField => self.active.children(id).first().copied(),
            _ => None,
        };
        if let Some(child) = mu_child {
            self.active.get_mut(child).set_name(new_name);
        }
        self.reindex();
        debug!(field = %name, new_name = %new_name, "renamed field");
        Ok(())
    }

    /// Names of all descriptor fields in the file tree.
    pub fn descriptors(&self) -> Vec<String> {
        self.file_tree
            .preorder(TypeTree::ROOT)
            .into_iter()
            .map(|id| self.file_tree.get(id))
            .filter(|ty| ty.has_option(FieldOptions::DE) || ty.is_special_descriptor())
            .map(|ty| ty.name().to_string())
            .collect()
    }

    /// Drop descriptor placeholders and super descriptors from both trees.
    pub fn remove_special_descriptors(&mut self) {
        for tree in [&mut self.file_tree, &mut self.active] {
            let special: Vec<TypeId> = tree
                .preorder(TypeTree::ROOT)
                .into_iter()
                .filter(|id| tree.get(*id).is_special_descriptor())
                .collect();
            for id in special {
                tree.detach(id);
            }
        }
        self.file_names = Self::index(&self.file_tree);
        self.reindex();
        self.values = None;
    }

    // ── Values ─────────────────────────────────────────────────────

    /// Materialized values, if created or parsed.
    pub fn values(&self) -> Option<&[AdaValue]> {
        self.values.as_deref()
    }

    /// Mutable materialized values.
    pub fn values_mut(&mut self) -> Option<&mut [AdaValue]> {
        self.values.as_deref_mut()
    }

    pub(crate) fn set_values(&mut self, values: Vec<AdaValue>) {
        self.values = Some(values);
    }

    pub(crate) fn take_values(&mut self) -> Option<Vec<AdaValue>> {
        self.values.take()
    }

    /// Drop the value tree.
    pub fn clear_values(&mut self) {
        self.values = None;
    }

    /// Build a fresh, empty value tree from the active tree.
    ///
    /// Period groups and multiple fields start without elements.
    pub fn create_values(&mut self, for_storing: bool) -> Result<()> {
        let values = element_values(&self.active, TypeTree::ROOT, 0, 0, for_storing)?;
        debug!(count = values.len(), for_storing, "created values");
        self.values = Some(values);
        self.need_second_call = SecondCall::None;
        Ok(())
    }

    /// Value by name; `NAME[pe]` and `NAME[pe][mu]` select an occurrence.
    pub fn search_value(&self, name: &str) -> Option<&AdaValue> {
        let values = self.values.as_deref()?;
        let caps = VALUE_INDEX.captures(name)?;
        let field = caps.get(1)?.as_str();
        let indexes: Vec<u32> = [caps.get(2), caps.get(3)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
            .collect();
        if indexes.is_empty() {
            return find_first(values, field);
        }
        let id = self.search_type_id(field)?;
        let path = self.value_path(id);
        let (pe, mu) = self.split_indexes(id, &indexes).ok()?;
        locate(values, &path, &self.active, pe, mu)
    }

    /// Node path from the top level down to the value holding `id`.
    fn value_path(&self, id: TypeId) -> Vec<TypeId> {
        let mut path = self.active.ancestors(id);
        path.reverse();
        path.push(id);
        if self.active.get(id).kind() == FieldKind::MultipleField {
            if let Some(child) = self.active.children(id).first() {
                path.push(*child);
            }
        }
        path
    }

    /// Map the caller's index list to `(pe, mu)` for node `id`.
    fn split_indexes(&self, id: TypeId, indexes: &[u32]) -> Result<(Option<u32>, Option<u32>)> {
        let ty = self.active.get(id);
        let in_pe = ty.has_flag(TypeFlags::PE);
        let in_mu = ty.kind() == FieldKind::MultipleField
            || ty.has_flag(TypeFlags::MU);
        Ok(match (in_pe, in_mu, indexes) {
            (_, _, []) => (None, None),
            (true, true, [pe]) => (Some(*pe), None),
            (true, true, [pe, mu, ..]) => (Some(*pe), Some(*mu)),
            (true, false, [pe, ..]) => (Some(*pe), None),
            (false, true, [mu, ..]) => (None, Some(*mu)),
            (false, false, _) => {
                return Err(AdaError::IndexOnNonMultiple {
                    name: ty.name().to_string(),
                })
            }
        })
    }

    /// Navigate to the value of `name` at `indexes`, creating missing
    /// period and multiple elements when `create` is set.
    pub fn search_value_by_index(
        &mut self,
        name: &str,
        indexes: &[u32],
        create: bool,
    ) -> Result<&mut AdaValue> {
        let id = self.search_type_id(name).ok_or_else(|| AdaError::FieldNotFound {
            name: name.to_string(),
        })?;
        let path = self.value_path(id);
        let (pe, mu) = self.split_indexes(id, indexes)?;
        if self.values.is_none() {
            if !create {
                return Err(AdaError::NoValues);
            }
            self.create_values(true)?;
        }
        let values = self.values.as_deref_mut().ok_or(AdaError::NoValues)?;
        locate_mut(values, &path, &self.active, pe, mu, create)
    }

    /// Assign `value` to the leaf `name` at `indexes`, creating occurrences as needed.
    pub fn set_value<'a>(
        &mut self,
        name: &str,
        indexes: &[u32],
        value: impl Into<ValueInput<'a>>,
    ) -> Result<()> {
        let target = self.search_value_by_index(name, indexes, true)?;
        let field = target.as_field_mut().ok_or_else(|| AdaError::TypeMismatch {
            input: "structure".to_string(),
            name: name.to_string(),
        })?;
        field.set(value)?;
        trace!(field = %name, ?indexes, value = %field.string(), "set value");
        Ok(())
    }

    // ── Traversal & dumps ──────────────────────────────────────────

    /// Traverse the active or the file tree.
    pub fn traverse_types<E, L>(&self, active: bool, enter: &mut E, leave: &mut L) -> Result<TraverseResult>
    where
        E: FnMut(&TypeTree, TypeId) -> Result<TraverseResult>,
        L: FnMut(&TypeTree, TypeId) -> Result<TraverseResult>,
    {
        let tree = if active { &self.active } else { &self.file_tree };
        traverse::traverse_types(tree, TypeTree::ROOT, enter, leave)
    }

    /// Traverse the value tree.
    pub fn traverse_values<E, L, C>(&self, enter: &mut E, leave: &mut L, element: &mut C) -> Result<TraverseResult>
    where
        E: FnMut(&AdaValue) -> Result<TraverseResult>,
        L: FnMut(&AdaValue) -> Result<TraverseResult>,
        C: FnMut(&StructureValue, u32, usize) -> Result<TraverseResult>,
    {
        let values = self.values.as_deref().ok_or(AdaError::NoValues)?;
        traverse::traverse_values(values, enter, leave, element)
    }

    /// FDT dump of the active or the file tree.
    pub fn dump_types(&self, active: bool) -> String {
        if active {
            self.active.dump()
        } else {
            self.file_tree.dump()
        }
    }

    /// Dump of the value tree.
    pub fn dump_values(&self) -> String {
        let mut out = String::new();
        for value in self.values.as_deref().unwrap_or_default() {
            value.dump(&mut out);
        }
        out
    }

    /// Value tree as a JSON object keyed by top-level field name.
    pub fn values_json(&self) -> Result<serde_json::Value> {
        let values = self.values.as_deref().ok_or(AdaError::NoValues)?;
        let map = values
            .iter()
            .map(|v| (v.name().to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Ok(serde_json::Value::Object(map))
    }
}

// ── Value construction ─────────────────────────────────────────────

/// Values for one element of structure `parent`.
pub(crate) fn element_values(
    tree: &TypeTree,
    parent: TypeId,
    pe: u32,
    mu: u32,
    for_storing: bool,
) -> Result<Vec<AdaValue>> {
    let mut values = Vec::with_capacity(tree.children(parent).len());
    for child in tree.children(parent) {
        if let Some(value) = create_value(tree, *child, pe, mu, for_storing)? {
            values.push(value);
        }
    }
    Ok(values)
}

/// Empty value for node `id` at position `(pe, mu)`.
pub(crate) fn create_value(
    tree: &TypeTree,
    id: TypeId,
    pe: u32,
    mu: u32,
    for_storing: bool,
) -> Result<Option<AdaValue>> {
    let ty = tree.get(id);
    if for_storing && ty.is_special_descriptor() {
        return Ok(None);
    }
    if !ty.is_structure() {
        let value = FieldValue::new(tree.arc(id))?
            .with_type_id(id)
            .with_index(pe, mu);
        return Ok(Some(AdaValue::Field(value)));
    }
    let mut structure = StructureValue::new(tree.arc(id))
        .with_type_id(id)
        .with_index(pe, mu);
    let single = match ty.kind() {
        FieldKind::Group => true,
        FieldKind::Structure => ty.occurrence() == crate::fdt::Occurrence::Single,
        _ => false,
    };
    if single {
        let children = element_values(tree, id, pe, mu, for_storing)?;
        let element = structure.add_element(1);
        for child in children {
            element.push(child);
        }
    }
    Ok(Some(AdaValue::Structure(structure)))
}

/// Element index to follow below structure node `id`.
fn element_index(tree: &TypeTree, id: TypeId, pe: Option<u32>, mu: Option<u32>) -> Result<Option<u32>> {
    let ty = tree.get(id);
    match ty.kind() {
        FieldKind::PeriodGroup => pe.map(Some).ok_or_else(|| AdaError::IndexRequiredForPE {
            name: ty.name().to_string(),
        }),
        FieldKind::MultipleField => mu.map(Some).ok_or_else(|| AdaError::IndexRequiredForPE {
            name: ty.name().to_string(),
        }),
        _ => Ok(None),
    }
}

fn find_first<'a>(values: &'a [AdaValue], name: &str) -> Option<&'a AdaValue> {
    for value in values {
        if value.name() == name || value.ty().short_name() == name {
            if let AdaValue::Structure(s) = value {
                if s.ty().kind() == FieldKind::MultipleField {
                    if let Some(first) = s.elements().first().and_then(|e| e.values().first()) {
                        return Some(first);
                    }
                }
            }
            return Some(value);
        }
        if let AdaValue::Structure(s) = value {
            for element in s.elements() {
                if let Some(found) = find_first(element.values(), name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn locate<'a>(
    values: &'a [AdaValue],
    path: &[TypeId],
    tree: &TypeTree,
    pe: Option<u32>,
    mu: Option<u32>,
) -> Option<&'a AdaValue> {
    let (head, rest) = path.split_first()?;
    let value = values.iter().find(|v| v.type_id() == Some(*head))?;
    if rest.is_empty() {
        return Some(value);
    }
    let structure = value.as_structure()?;
    let element = match element_index(tree, *head, pe, mu).ok()? {
        Some(index) => structure.element(index)?,
        None => structure.elements().first()?,
    };
    locate(element.values(), rest, tree, pe, mu)
}

fn locate_mut<'a>(
    values: &'a mut [AdaValue],
    path: &[TypeId],
    tree: &TypeTree,
    pe: Option<u32>,
    mu: Option<u32>,
    create: bool,
) -> Result<&'a mut AdaValue> {
    let not_found = || AdaError::ValueNotFound {
        name: path
            .last()
            .map(|id| tree.get(*id).name().to_string())
            .unwrap_or_default(),
    };
    let Some((head, rest)) = path.split_first() else {
        return Err(not_found());
    };
    let value = values
        .iter_mut()
        .find(|v| v.type_id() == Some(*head))
        .ok_or_else(not_found)?;
    if rest.is_empty() {
        return Ok(value);
    }
    let Some(structure) = value.as_structure_mut() else {
        return Err(not_found());
    };
    let index = match element_index(tree, *head, pe, mu)? {
        Some(index) => index,
        None => structure.elements().first().map_or(1, |e| e.index()),
    };
    if structure.element(index).is_none() {
        if !create {
            return Err(AdaError::ElementNotFound {
                name: structure.name().to_string(),
                index,
            });
        }
        let (elem_pe, elem_mu) = match tree.get(*head).kind() {
            FieldKind::PeriodGroup => (index, 0),
            FieldKind::MultipleField => (pe.unwrap_or(0), index),
            _ => (structure.pe_index(), structure.mu_index()),
        };
        let children = element_values(tree, *head, elem_pe, elem_mu, true)?;
        let element = structure.add_element(index);
        for child in children {
            element.push(child);
        }
        trace!(structure = %tree.get(*head).name(), index, "created element");
    }
    let element = structure
        .element_mut(index)
        .ok_or_else(|| AdaError::ElementNotFound {
            name: tree.get(*head).name().to_string(),
            index,
        })?;
    locate_mut(element.values_mut(), rest, tree, pe, mu, create)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `U4`, period group `PG` with `GC` (character) and MU `GM` (packed 5), `I8`.
    pub(crate) fn period_definition() -> Definition {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        let pg = def.append(AdaType::structure(FieldKind::PeriodGroup, "PG"));
        def.add_child(pg, AdaType::new(FieldKind::Character, "GC"));
        def.add_multiple(pg, AdaType::with_length(FieldKind::Packed, "GM", 5));
        def.append(AdaType::new(FieldKind::Int8, "I8"));
        def
    }

    #[test]
    fn test_tree_shape() {
        let def = period_definition();
        let gm = def.search_type_id("GM").unwrap();
        let ty = def.active_tree().get(gm);
        assert_eq!(ty.kind(), FieldKind::MultipleField);
        assert!(ty.has_flag(TypeFlags::PE));
        assert!(ty.has_flag(TypeFlags::ATOMIC_FB));
        let dump = def.dump_types(true);
        assert!(dump.contains("  2, GM, 5, P,MU ; GM"), "{dump}");
    }

    #[test]
    fn test_create_values_empty_period() {
        let mut def = period_definition();
        def.create_values(false).unwrap();
        let values = def.values().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1].as_structure().unwrap().nr_elements(), 0);
    }

    #[test]
    fn test_set_value_creates_elements() {
        let mut def = period_definition();
        def.create_values(true).unwrap();
        def.set_value("U4", &[], 12u32).unwrap();
        def.set_value("GC", &[2], "x").unwrap();
        def.set_value("GM", &[2, 3], 555).unwrap();
        let pg = def.search_value("PG").unwrap().as_structure().unwrap();
        assert_eq!(pg.nr_elements(), 1);
        let gm = def.search_value("GM[2][3]").unwrap().as_field().unwrap();
        assert_eq!(gm.get_i64().unwrap(), 555);
        assert_eq!((gm.pe_index(), gm.mu_index()), (2, 3));
        assert_eq!(def.search_value("U4").unwrap().string(), "12");
        let dump = def.dump_values();
        assert!(dump.contains("    GM[2,3] = >555<"), "{dump}");
    }

    #[test]
    fn test_values_json() {
        let mut def = period_definition();
        assert!(def.values_json().is_err());
        def.create_values(true).unwrap();
        def.set_value("U4", &[], 7u32).unwrap();
        def.set_value("GC", &[1], "x").unwrap();
        def.set_value("GM", &[1, 1], 12).unwrap();
        def.set_value("GM", &[1, 2], -3).unwrap();
        let json = def.values_json().unwrap();
        assert_eq!(json["U4"], 7);
        assert_eq!(json["PG"][0]["GC"], "x");
        assert_eq!(json["PG"][0]["GM"], serde_json::json!(["12", "-3"]));
        assert_eq!(json["I8"], 0);
    }

    #[test]
    fn test_set_value_requires_period_index() {
        let mut def = period_definition();
        let err = def.set_value("GM", &[], 1).unwrap_err();
        assert_eq!(err.code(), 121);
        let err = def.set_value("U4", &[1], 1).unwrap_err();
        assert_eq!(err.code(), 126);
    }

    #[test]
    fn test_search_without_create() {
        let mut def = period_definition();
        def.create_values(true).unwrap();
        let err = def.search_value_by_index("GC", &[1], false).unwrap_err();
        assert_eq!(err.code(), 123);
        assert!(def.search_value("GC[1]").is_none());
    }

    #[test]
    fn test_adapt_name() {
        let mut def = period_definition();
        def.adapt_name("U4", "PERSONNEL-ID").unwrap();
        assert!(def.search_type("PERSONNEL-ID").is_some());
        assert!(def.search_type("U4").is_some());
        assert!(def.adapt_name("ZZ", "X").is_err());
    }

    #[test]
    fn test_redefinition() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::String, "AB", 6));
        def.add_redefinition(
            "AB",
            vec![
                AdaType::with_length(FieldKind::String, "R1", 2),
                AdaType::with_length(FieldKind::String, "R2", 4),
            ],
        )
        .unwrap();
        assert_eq!(def.search_type("AB").unwrap().kind(), FieldKind::Redefinition);
        let err = def
            .add_redefinition("AB", vec![AdaType::with_length(FieldKind::String, "R1", 5)])
            .unwrap_err();
        assert_eq!(err.code(), 93);
    }

    #[test]
    fn test_descriptors() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::String, "AA", 8).with_option(FieldOptions::DE));
        def.append(AdaType::with_length(FieldKind::String, "AB", 4));
        def.append(AdaType::super_desc(
            "S1",
            vec![
                crate::fdt::SuperEntry::new("AA", 1, 2),
                crate::fdt::SuperEntry::new("AB", 1, 4),
            ],
        ));
        def.append(AdaType::phonetic("PH", 20, "AA"));
        def.init_references();
        assert_eq!(def.descriptors(), ["AA", "S1", "PH"]);
        let s1 = def.search_type("S1").unwrap();
        match s1.detail() {
            TypeDetail::SuperDesc { entries } => {
                assert_eq!(entries[0].kind, Some(FieldKind::String));
            }
            other => panic!("unexpected detail {other:?}"),
        }
        def.remove_special_descriptors();
        assert!(def.search_type("S1").is_none());
        assert_eq!(def.descriptors(), ["AA"]);
    }
}
