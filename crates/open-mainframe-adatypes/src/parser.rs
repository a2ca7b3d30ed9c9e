//! Record buffer parser.
//!
//! The first pass builds the value tree from the active type tree while
//! reading the record buffer. Multiple fields inside period groups and the
//! rest of partially read LOBs only arrive with a second call; the second
//! pass fills them into the existing value tree.

use tracing::{debug, enabled, trace, Level};

use crate::buffer::{BufferHelper, Endian};
use crate::config::EngineConfig;
use crate::definition::{element_values, Definition};
use crate::dump::format_bytes;
use crate::fdt::{AdaType, FieldCondition, Occurrence, TypeId, TypeTree, NO_REFERENCE_FIELD};
use crate::format_buffer::{collapsible, is_stored, lob_chunk, missing_lob};
use crate::kind::{FieldKind, FieldOptions, TypeFlags};
use crate::traverse::{self, TraverseResult};
use crate::value::{AdaValue, FieldData, FieldValue, StructureValue};
use crate::{AdaError, Result};

/// Follow-up call a parse or store left pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecondCall {
    /// Nothing pending.
    #[default]
    None,
    /// MU occurrences in period groups or LOB remainders must be read.
    ReadSecond,
    /// LOB chunks remain to be stored.
    StoreSecond,
}

/// Per-call parser and serializer options.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferOption {
    /// Number of the follow-up call, 0 for the first call.
    pub second_call: u32,
    /// Mainframe layout with zero-occurrence padding.
    pub mainframe: bool,
    /// Set by values that need another call.
    pub need_second_call: SecondCall,
    /// Block size of the first LOB read.
    pub partial_lob_size: u32,
    /// Chunk size of LOB stores.
    pub store_lob_block: u32,
    /// Period group occurrence limit.
    pub max_pe_occurrences: u32,
    /// Occurrence limit of all other counted structures.
    pub max_occurrences: u32,
}

impl BufferOption {
    /// Options for a first call under `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            second_call: 0,
            mainframe: config.mainframe,
            need_second_call: SecondCall::None,
            partial_lob_size: config.buffer.partial_lob_size,
            store_lob_block: config.buffer.store_lob_block,
            max_pe_occurrences: config.limits.max_pe_occurrences,
            max_occurrences: config.limits.max_occurrences,
        }
    }

    /// Builder: follow-up call number.
    pub fn with_second_call(mut self, call: u32) -> Self {
        self.second_call = call;
        self
    }
}

/// Leaves that occupy bytes in a read record buffer.
fn consumes(ty: &AdaType) -> bool {
    if ty.has_flag(TypeFlags::REFERENCE) {
        return false;
    }
    match ty.kind() {
        FieldKind::Phonetic | FieldKind::Collation | FieldKind::Referential => false,
        FieldKind::SuperDesc | FieldKind::HyperDesc => {
            !(ty.has_option(FieldOptions::PE) || ty.has_flag(TypeFlags::PE))
        }
        _ => true,
    }
}

fn check_limit(ty: &AdaType, count: u32, option: &BufferOption) -> Result<()> {
    let limit = if ty.kind() == FieldKind::PeriodGroup {
        option.max_pe_occurrences
    } else {
        option.max_occurrences
    };
    if count > limit {
        return Err(AdaError::ImplausibleOccurrence {
            name: ty.name().to_string(),
            count,
        });
    }
    Ok(())
}

/// Value of node `id` inside one element, looking through groups.
fn find_value_mut(values: &mut [AdaValue], id: TypeId) -> Option<&mut AdaValue> {
    for value in values.iter_mut() {
        if value.type_id() == Some(id) {
            return Some(value);
        }
        if let AdaValue::Structure(structure) = value {
            if structure.ty().kind() == FieldKind::Group {
                for element in structure.elements_mut() {
                    if let Some(found) = find_value_mut(element.values_mut(), id) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Nodes of a period group read field by field, in format buffer order.
fn field_major_order(tree: &TypeTree, id: TypeId) -> Vec<TypeId> {
    let mut order = Vec::new();
    for child in tree.children(id) {
        match tree.get(*child).kind() {
            FieldKind::Group => order.extend(field_major_order(tree, *child)),
            _ => order.push(*child),
        }
    }
    order
}

// ── First pass ─────────────────────────────────────────────────────

struct TypeParser<'a> {
    tree: &'a TypeTree,
    option: &'a mut BufferOption,
    reference_prefix: &'a str,
    deferred: Vec<TypeId>,
}

impl TypeParser<'_> {
    fn children(&mut self, helper: &mut BufferHelper, parent: TypeId, pe: u32, mu: u32) -> Result<Vec<AdaValue>> {
        let tree = self.tree;
        let mut values = Vec::with_capacity(tree.children(parent).len());
        for child in tree.children(parent) {
            values.push(self.node(helper, *child, pe, mu)?);
        }
        Ok(values)
    }

    fn node(&mut self, helper: &mut BufferHelper, id: TypeId, pe: u32, mu: u32) -> Result<AdaValue> {
        let tree = self.tree;
        let ty = tree.get(id);
        if !ty.is_structure() {
            let mut value = FieldValue::new(tree.arc(id))?
                .with_type_id(id)
                .with_index(pe, mu);
            self.fill(helper, &mut value)?;
            return Ok(AdaValue::Field(value));
        }
        let mut structure = StructureValue::new(tree.arc(id))
            .with_type_id(id)
            .with_index(pe, mu);
        match ty.kind() {
            FieldKind::PeriodGroup => self.period(helper, id, &mut structure)?,
            FieldKind::MultipleField if ty.has_flag(TypeFlags::PE) => {
                self.multiple_in_period(helper, id, &mut structure)?
            }
            FieldKind::MultipleField => self.multiple(helper, id, &mut structure, pe)?,
            FieldKind::Group => {
                let values = self.children(helper, id, pe, mu)?;
                let element = structure.add_element(1);
                for value in values {
                    element.push(value);
                }
            }
            _ => self.structure(helper, id, &mut structure, pe, mu)?,
        }
        Ok(AdaValue::Structure(structure))
    }

    fn fill(&mut self, helper: &mut BufferHelper, value: &mut FieldValue) -> Result<()> {
        let ty = value.ty();
        if ty.has_flag(TypeFlags::REFERENCE) {
            let field = ty.name().trim_start_matches('@');
            let reference = format!("{}{field}", self.reference_prefix);
            *value.data_mut() = FieldData::Reference(reference);
            return Ok(());
        }
        if !consumes(ty) {
            return Ok(());
        }
        value.parse_buffer(helper, self.option)
    }

    /// Occurrence count of a counted structure; `None` reads until the end.
    fn occurrences(&self, helper: &mut BufferHelper, id: TypeId) -> Result<Option<u32>> {
        let ty = self.tree.get(id);
        let counted = matches!(ty.kind(), FieldKind::PeriodGroup | FieldKind::MultipleField);
        if counted && ty.has_flag(TypeFlags::SINGLE_INDEX) {
            if helper.is_at_end() && self.requests_last(id) {
                return Ok(Some(0));
            }
            return Ok(Some(1));
        }
        let count = match ty.occurrence() {
            Occurrence::Capacity => helper.receive_u32()?,
            Occurrence::ByteCount => u32::from(helper.receive_u8()?),
            Occurrence::UInt2 => u32::from(helper.receive_u16()?),
            Occurrence::Single => 1,
            Occurrence::Fixed(n) => n,
            Occurrence::None => return Ok(None),
        };
        check_limit(ty, count, self.option)?;
        Ok(Some(count))
    }

    /// A leaf below `id` asks for the last occurrence, which may not exist.
    fn requests_last(&self, id: TypeId) -> bool {
        let period = self.tree.get(id).kind() == FieldKind::PeriodGroup;
        self.tree.leaves(id).iter().any(|leaf| {
            let leaf = self.tree.get(*leaf);
            if period {
                leaf.pe_range().is_last()
            } else {
                leaf.mu_range().is_last()
            }
        })
    }

    /// Skip the padding a mainframe sends for an empty PE or MU.
    fn pad(&self, helper: &mut BufferHelper, id: TypeId) -> Result<()> {
        if self.option.mainframe && !helper.is_at_end() {
            let width = self.tree.fixed_width(id);
            helper.receive_bytes(width as usize)?;
            trace!(field = %self.tree.get(id).name(), width, "skipped empty occurrence padding");
        }
        Ok(())
    }

    fn period(&mut self, helper: &mut BufferHelper, id: TypeId, structure: &mut StructureValue) -> Result<()> {
        let tree = self.tree;
        let ty = tree.get(id);
        let count = self.occurrences(helper, id)?.unwrap_or_default();
        debug!(field = %ty.name(), occurrences = count, "period group");
        if count == 0 {
            return self.pad(helper, id);
        }
        let range = ty.pe_range();
        let indexes: Vec<u32> = (1..=count).map(|i| range.index(i, count)).collect();
        if collapsible(tree, id) {
            for index in indexes {
                let values = self.children(helper, id, index, 0)?;
                let element = structure.add_element(index);
                for value in values {
                    element.push(value);
                }
            }
            return Ok(());
        }
        for index in &indexes {
            let values = element_values(tree, id, *index, 0, false)?;
            let element = structure.add_element(*index);
            for value in values {
                element.push(value);
            }
        }
        for node in field_major_order(tree, id) {
            for element in structure.elements_mut() {
                let target = find_value_mut(element.values_mut(), node).ok_or_else(|| {
                    AdaError::ValueNotFound {
                        name: tree.get(node).name().to_string(),
                    }
                })?;
                match target {
                    AdaValue::Field(field) => self.fill(helper, field)?,
                    AdaValue::Structure(mu) => self.multiple_in_period(helper, node, mu)?,
                }
            }
        }
        Ok(())
    }

    fn multiple_in_period(&mut self, helper: &mut BufferHelper, id: TypeId, structure: &mut StructureValue) -> Result<()> {
        let tree = self.tree;
        let Some(leaf) = tree.children(id).first().copied() else {
            return Ok(());
        };
        let leaf_ty = tree.get(leaf);
        if !leaf_ty.has_flag(TypeFlags::SINGLE_INDEX) {
            self.deferred.push(id);
            self.option.need_second_call = SecondCall::ReadSecond;
            return Ok(());
        }
        let index = leaf_ty.mu_range().index(1, 1);
        let mut value = FieldValue::new(tree.arc(leaf))?
            .with_type_id(leaf)
            .with_index(structure.pe_index(), index);
        self.fill(helper, &mut value)?;
        structure.add_element(index).push(AdaValue::Field(value));
        Ok(())
    }

    fn multiple(&mut self, helper: &mut BufferHelper, id: TypeId, structure: &mut StructureValue, pe: u32) -> Result<()> {
        let tree = self.tree;
        let Some(leaf) = tree.children(id).first().copied() else {
            return Ok(());
        };
        let count = self.occurrences(helper, id)?.unwrap_or_default();
        trace!(field = %tree.get(id).name(), occurrences = count, "multiple field");
        if count == 0 {
            return self.pad(helper, id);
        }
        let range = tree.get(leaf).mu_range();
        for i in 1..=count {
            let index = range.index(i, count);
            let mut value = FieldValue::new(tree.arc(leaf))?
                .with_type_id(leaf)
                .with_index(pe, index);
            self.fill(helper, &mut value)?;
            structure.add_element(index).push(AdaValue::Field(value));
        }
        Ok(())
    }

    /// Generic structure: counted elements, optionally driven by a condition.
    fn structure(
        &mut self,
        helper: &mut BufferHelper,
        id: TypeId,
        structure: &mut StructureValue,
        pe: u32,
        mu: u32,
    ) -> Result<()> {
        let tree = self.tree;
        let ty = tree.get(id);
        let count = self.occurrences(helper, id)?;
        let mut index = 0u32;
        loop {
            match count {
                Some(c) if index >= c => break,
                None if helper.is_at_end() => break,
                _ => {}
            }
            index += 1;
            let start = helper.offset();
            let values = match ty.condition() {
                Some(condition) => self.conditional(helper, id, condition, pe, mu)?,
                None => self.children(helper, id, pe, mu)?,
            };
            if count.is_none() && helper.offset() == start {
                return Err(AdaError::EmptyPeriodLengthZero {
                    name: ty.name().to_string(),
                });
            }
            let element = structure.add_element(index);
            for value in values {
                element.push(value);
            }
        }
        Ok(())
    }

    /// One element of a structure whose children depend on a selector byte.
    fn conditional(
        &mut self,
        helper: &mut BufferHelper,
        id: TypeId,
        condition: &FieldCondition,
        pe: u32,
        mu: u32,
    ) -> Result<Vec<AdaValue>> {
        let tree = self.tree;
        let children = tree.children(id);
        let start = helper.offset();
        let selector = usize::try_from(condition.ref_field_index)
            .ok()
            .filter(|_| condition.ref_field_index != NO_REFERENCE_FIELD);
        let linear = selector.map_or(children.len(), |r| (r + 1).min(children.len()));
        let mut values = Vec::with_capacity(children.len());
        for child in &children[..linear] {
            values.push(self.node(helper, *child, pe, mu)?);
        }
        if let Some(selector) = selector {
            let value = match values.get(selector).and_then(AdaValue::as_field) {
                Some(field) => field.get_u64()?,
                None => 0,
            };
            let key = u8::try_from(value).unwrap_or(u8::MAX);
            let row = condition
                .matrix
                .get(&key)
                .ok_or_else(|| AdaError::MissingConditionRow {
                    name: tree.get(id).name().to_string(),
                    value: key,
                })?;
            for index in row {
                if let Some(child) = children.get(*index) {
                    values.push(self.node(helper, *child, pe, mu)?);
                }
            }
        }
        if let Ok(length_index) = usize::try_from(condition.length_field_index) {
            if let Some(field) = values.get(length_index).and_then(AdaValue::as_field) {
                let length = field.get_u64()? as usize;
                helper.position(start + length)?;
            }
        }
        Ok(values)
    }
}

// ── Second pass ────────────────────────────────────────────────────

fn read_deferred_multiple(
    tree: &TypeTree,
    structure: &mut StructureValue,
    helper: &mut BufferHelper,
    option: &mut BufferOption,
) -> Result<()> {
    let leaf = structure
        .type_id()
        .and_then(|id| tree.children(id).first().copied())
        .ok_or_else(|| AdaError::ValueNotFound {
            name: structure.name().to_string(),
        })?;
    let count = helper.receive_u32()?;
    check_limit(structure.ty(), count, option)?;
    let range = tree.get(leaf).mu_range();
    let pe = structure.pe_index();
    structure.clear();
    for i in 1..=count {
        let index = range.index(i, count);
        let mut value = FieldValue::new(tree.arc(leaf))?
            .with_type_id(leaf)
            .with_index(pe, index);
        value.parse_buffer(helper, option)?;
        structure.add_element(index).push(AdaValue::Field(value));
    }
    trace!(field = %structure.name(), pe, occurrences = count, "second call multiple field");
    Ok(())
}

fn second_pass(
    tree: &TypeTree,
    values: &mut [AdaValue],
    helper: &mut BufferHelper,
    option: &mut BufferOption,
) -> Result<()> {
    for value in values.iter_mut() {
        match value {
            AdaValue::Structure(structure) => {
                let deferred = structure
                    .type_id()
                    .is_some_and(|id| tree.get(id).has_flag(TypeFlags::SECOND_CALL));
                if deferred && structure.ty().kind() == FieldKind::MultipleField {
                    read_deferred_multiple(tree, structure, helper, option)?;
                } else {
                    for element in structure.elements_mut() {
                        second_pass(tree, element.values_mut(), helper, option)?;
                    }
                }
            }
            AdaValue::Field(field) => {
                if missing_lob(field).is_some() {
                    field.parse_buffer(helper, option)?;
                }
            }
        }
    }
    Ok(())
}

impl Definition {
    /// Parse a record buffer answering a format buffer of this definition.
    ///
    /// With `option.second_call == 0` the value tree is rebuilt from the
    /// active tree. A follow-up call fills the deferred MU occurrences and
    /// LOB remainders into the existing values.
    pub fn parse_buffer(&mut self, helper: &mut BufferHelper, option: &mut BufferOption) -> Result<()> {
        if enabled!(Level::TRACE) {
            trace!("{}", format_bytes("record buffer", helper.buffer(), 8, 16));
        }
        option.need_second_call = SecondCall::None;
        if option.second_call > 0 {
            let mut values = self.take_values().ok_or(AdaError::NoValues)?;
            let result = second_pass(self.active_tree(), &mut values, helper, option);
            self.set_values(values);
            result?;
        } else {
            let (values, deferred) = {
                let mut parser = TypeParser {
                    tree: self.active_tree(),
                    option: &mut *option,
                    reference_prefix: self.reference_prefix(),
                    deferred: Vec::new(),
                };
                let values = parser.children(helper, TypeTree::ROOT, 0, 0)?;
                (values, parser.deferred)
            };
            let tree = self.active_tree_mut();
            for id in deferred {
                tree.get_mut(id).add_flag(TypeFlags::SECOND_CALL);
            }
            self.set_values(values);
        }
        self.set_need_second_call(option.need_second_call);
        debug!(
            second_call = option.second_call,
            offset = helper.offset(),
            max = helper.max(),
            need_second_call = ?option.need_second_call,
            "parsed record buffer"
        );
        Ok(())
    }

    /// Serialize the value tree into a store record buffer.
    ///
    /// The byte order follows the store format buffer; follow-up calls only
    /// carry the next LOB chunks.
    pub fn store_record_buffer(&mut self, option: &mut BufferOption) -> Result<BufferHelper> {
        let endian = if option.mainframe {
            Endian::Big
        } else {
            Endian::native()
        };
        let mut helper = BufferHelper::for_writing(endian);
        option.need_second_call = SecondCall::None;
        let values = self.values().ok_or(AdaError::NoValues)?;
        traverse::traverse_values(
            values,
            &mut |value| {
                let AdaValue::Field(field) = value else {
                    return Ok(TraverseResult::Continue);
                };
                if !is_stored(field) {
                    return Ok(TraverseResult::Continue);
                }
                let write = match lob_chunk(field, option) {
                    Some((start, end)) => start < end,
                    None => option.second_call == 0,
                };
                if write {
                    field.store_buffer(&mut helper, option)?;
                }
                Ok(TraverseResult::Continue)
            },
            &mut traverse::continue_values,
            &mut |_, _, _| Ok(TraverseResult::Continue),
        )?;
        self.set_need_second_call(option.need_second_call);
        debug!(
            bytes = helper.max(),
            need_second_call = ?option.need_second_call,
            "stored record buffer"
        );
        Ok(helper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::tests::period_definition;
    use crate::format_buffer::RequestMode;

    fn helper(bytes: Vec<u8>) -> BufferHelper {
        BufferHelper::new(bytes, Endian::Little)
    }

    fn field<'a>(def: &'a Definition, name: &str) -> &'a FieldValue {
        def.search_value(name).and_then(AdaValue::as_field).unwrap()
    }

    #[test]
    fn test_variable_integer() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::Int4, "I4", 0));
        let mut option = def.buffer_option();
        for (bytes, expected) in [
            (vec![0x02, 0xFF], -1),
            (vec![0x03, 0x01, 0x01], 257),
            (vec![0x04, 0x01, 0x01, 0x01], 65793),
        ] {
            def.parse_buffer(&mut helper(bytes), &mut option).unwrap();
            assert_eq!(field(&def, "I4").get_i64().unwrap(), expected);
        }
    }

    #[test]
    fn test_period_with_multiple_two_calls() {
        let mut def = period_definition();
        def.restrict_to_fields("U4,PG").unwrap();
        let mut option = def.buffer_option();
        let fb = def.create_format_buffer(RequestMode::Read, &option).unwrap();
        assert_eq!(fb.format_buffer, "U4,4,B,PGC,4,B,GC1-N,1,A.");

        let mut rb = vec![7, 0, 0, 0, 1, 0, 0, 0];
        rb.push(b'A');
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(def.need_second_call(), SecondCall::ReadSecond);
        assert_eq!(field(&def, "U4").get_u32().unwrap(), 7);
        assert_eq!(field(&def, "GC[1]").string(), "A");
        let gm = def.search_value("PG").and_then(AdaValue::as_structure).unwrap();
        let element = gm.element(1).unwrap();
        let mu = element.get("GM").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(mu.nr_elements(), 0);

        option.second_call = 1;
        let fb = def.create_format_buffer(RequestMode::SecondCall, &option).unwrap();
        assert_eq!(fb.format_buffer, "GM1C,4,B,GM1(1-N),5.");
        let rb = vec![1, 0, 0, 0, 0x00, 0x00, 0x00, 0x12, 0x1D];
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(def.need_second_call(), SecondCall::None);
        assert_eq!(field(&def, "GM[1][1]").get_i64().unwrap(), -121);
    }

    #[test]
    fn test_second_call_multiple_indexes() {
        let mut def = period_definition();
        let mut option = def.buffer_option();
        let mut rb = vec![1, 0, 0, 0, 2, 0, 0, 0, b'x', b'y'];
        rb.extend(5i64.to_le_bytes());
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(field(&def, "GC[2]").string(), "y");
        assert_eq!(field(&def, "I8").get_i64().unwrap(), 5);

        option.second_call = 1;
        let fb = def.create_format_buffer(RequestMode::SecondCall, &option).unwrap();
        assert_eq!(fb.format_buffer, "GM1C,4,B,GM1(1-N),5,GM2C,4,B,GM2(1-N),5.");
        let rb = vec![
            2, 0, 0, 0, 0, 0, 0, 0, 0x1C, 0, 0, 0, 0, 0x2C, //
            0, 0, 0, 0,
        ];
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        let second = field(&def, "GM[1][2]");
        assert_eq!(second.get_i64().unwrap(), 2);
        assert_eq!((second.pe_index(), second.mu_index()), (1, 2));
        let pg = def.search_value("PG").and_then(AdaValue::as_structure).unwrap();
        let mu = pg.element(2).and_then(|e| e.get("GM")).and_then(AdaValue::as_structure).unwrap();
        assert_eq!(mu.nr_elements(), 0);
    }

    #[test]
    fn test_collapsed_period_occurrence_major() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt8, "U8"));
        let pg = def.append(AdaType::structure(FieldKind::PeriodGroup, "PG"));
        def.add_child(pg, AdaType::with_length(FieldKind::String, "P1", 2));
        def.add_child(pg, AdaType::new(FieldKind::UInt4, "P2"));
        let mut rb = 9u64.to_le_bytes().to_vec();
        rb.extend([2, 0, 0, 0]);
        rb.extend(b"ab");
        rb.extend([1, 0, 0, 0]);
        rb.extend(b"cd");
        rb.extend([2, 0, 0, 0]);
        let mut option = def.buffer_option();
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(field(&def, "P1[2]").string(), "cd");
        assert_eq!(field(&def, "P2[2]").get_u32().unwrap(), 2);
        assert_eq!(def.need_second_call(), SecondCall::None);
    }

    #[test]
    fn test_mainframe_padding() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.add_multiple(TypeTree::ROOT, AdaType::with_length(FieldKind::Packed, "GM", 5));
        def.append(AdaType::new(FieldKind::Int8, "I8"));
        let mut rb = vec![1, 0, 0, 0, 0, 0, 0, 0];
        rb.extend([0x40; 5]);
        rb.extend(3i64.to_le_bytes());
        let mut option = def.buffer_option();
        option.mainframe = true;
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(field(&def, "I8").get_i64().unwrap(), 3);
        let gm = def.search_value("GM").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(gm.nr_elements(), 0);
    }

    #[test]
    fn test_implausible_occurrence() {
        let mut def = Definition::new();
        def.add_multiple(TypeTree::ROOT, AdaType::with_length(FieldKind::String, "GM", 1));
        let mut option = def.buffer_option();
        let err = def
            .parse_buffer(&mut helper(4001u32.to_le_bytes().to_vec()), &mut option)
            .unwrap_err();
        assert!(matches!(err, AdaError::ImplausibleOccurrence { count: 4001, .. }));
    }

    #[test]
    fn test_partial_lob() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::LBString, "LB", 0));
        let mut option = def.buffer_option();
        let mut rb = 1_000_000u32.to_le_bytes().to_vec();
        rb.extend(vec![b'a'; 4096]);
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(def.need_second_call(), SecondCall::ReadSecond);
        assert_eq!(field(&def, "LB").lob_size(), 1_000_000);

        option.second_call = 1;
        let fb = def.create_format_buffer(RequestMode::SecondCall, &option).unwrap();
        assert_eq!(fb.format_buffer, "LB(4097,995904).");
        def.parse_buffer(&mut helper(vec![b'b'; 995_904]), &mut option).unwrap();
        assert_eq!(field(&def, "LB").bytes().unwrap().len(), 1_000_000);
        assert_eq!(def.need_second_call(), SecondCall::None);
    }

    #[test]
    fn test_last_occurrence() {
        let mut def = Definition::new();
        let gr = def.append(AdaType::structure(FieldKind::PeriodGroup, "GR"));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GS", 1));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GT", 1));
        def.restrict_to_fields("GS[N]").unwrap();
        let mut option = def.buffer_option();
        def.parse_buffer(&mut helper(vec![b'a']), &mut option).unwrap();
        let gr = def.search_value("GR").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(gr.nr_elements(), 1);
        assert_eq!(gr.get("GS", 1).unwrap().string(), "a");
    }

    #[test]
    fn test_last_occurrence_of_empty_period() {
        let mut def = Definition::new();
        let gr = def.append(AdaType::structure(FieldKind::PeriodGroup, "GR"));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GS", 1));
        def.restrict_to_fields("GS[N]").unwrap();
        let mut option = def.buffer_option();
        def.parse_buffer(&mut helper(Vec::new()), &mut option).unwrap();
        let gr = def.search_value("GR").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(gr.nr_elements(), 0);
        assert_eq!(def.need_second_call(), SecondCall::None);

        option.mainframe = true;
        def.parse_buffer(&mut helper(Vec::new()), &mut option).unwrap();
        let gr = def.search_value("GR").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(gr.nr_elements(), 0);
    }

    #[test]
    fn test_last_multiple_in_last_period() {
        let mut def = period_definition();
        def.restrict_to_fields("GM[N,N]").unwrap();
        let mut option = def.buffer_option();
        let rb = vec![0x00, 0x00, 0x00, 0x12, 0x1D];
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        assert_eq!(def.need_second_call(), SecondCall::None);
        let pg = def.search_value("PG").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(pg.nr_elements(), 1);
        let gm = pg.elements()[0]
            .get("GM")
            .and_then(AdaValue::as_structure)
            .unwrap();
        assert_eq!(gm.nr_elements(), 1);
        let value = gm.elements()[0].get("GM").and_then(AdaValue::as_field).unwrap();
        assert_eq!(value.get_i64().unwrap(), -121);

        def.parse_buffer(&mut helper(Vec::new()), &mut option).unwrap();
        let pg = def.search_value("PG").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(pg.nr_elements(), 0);
    }

    #[test]
    fn test_reference_value() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.append(AdaType::with_length(FieldKind::LBString, "GS", 0));
        def.restrict_to_fields("U4,@GS").unwrap();
        def.set_reference_prefix("/image/");
        let mut option = def.buffer_option();
        def.parse_buffer(&mut helper(vec![1, 0, 0, 0]), &mut option).unwrap();
        assert_eq!(def.search_value("@GS").unwrap().string(), "/image/GS");
    }

    fn condition_definition() -> Definition {
        let condition = FieldCondition::new(0, 1)
            .with_row(1, vec![2])
            .with_row(2, vec![3]);
        let mut def = Definition::new();
        let cs = def.append(AdaType::with_condition("CS", condition));
        def.add_child(cs, AdaType::new(FieldKind::UInt2, "LN"));
        def.add_child(cs, AdaType::new(FieldKind::UByte, "TY"));
        def.add_child(cs, AdaType::with_length(FieldKind::String, "AL", 2));
        def.add_child(cs, AdaType::new(FieldKind::UInt4, "NU"));
        def
    }

    #[test]
    fn test_condition_matrix() {
        let mut def = condition_definition();
        let rb = vec![5, 0, 1, b'h', b'i', 7, 0, 2, 9, 0, 0, 0];
        let mut option = def.buffer_option();
        def.parse_buffer(&mut helper(rb), &mut option).unwrap();
        let cs = def.search_value("CS").and_then(AdaValue::as_structure).unwrap();
        assert_eq!(cs.nr_elements(), 2);
        assert_eq!(cs.element(1).and_then(|e| e.get("AL")).unwrap().string(), "hi");
        assert_eq!(cs.element(2).and_then(|e| e.get("NU")).unwrap().string(), "9");
        assert!(cs.element(2).and_then(|e| e.get("AL")).is_none());
    }

    #[test]
    fn test_missing_condition_row() {
        let mut def = condition_definition();
        let mut option = def.buffer_option();
        let err = def
            .parse_buffer(&mut helper(vec![5, 0, 3, b'h', b'i']), &mut option)
            .unwrap_err();
        assert_eq!(err.code(), 81);
    }

    #[test]
    fn test_second_call_without_values() {
        let mut def = period_definition();
        let mut option = def.buffer_option().with_second_call(1);
        let err = def.parse_buffer(&mut helper(Vec::new()), &mut option).unwrap_err();
        assert!(matches!(err, AdaError::NoValues));
    }

    #[test]
    fn test_store_record_buffer() {
        let mut def = period_definition();
        def.create_values(true).unwrap();
        def.set_value("U4", &[], 1).unwrap();
        def.set_value("GC", &[1], "a").unwrap();
        def.set_value("GM", &[1, 1], 5).unwrap();
        def.set_value("I8", &[], 2).unwrap();
        let mut option = def.buffer_option();
        let fb = def.create_format_buffer(RequestMode::Store, &option).unwrap();
        let helper = def.store_record_buffer(&mut option).unwrap();
        assert_eq!(helper.max() as u32, fb.record_buffer_length);
        let mut expected = 1u32.to_ne_bytes().to_vec();
        expected.push(b'a');
        expected.extend([0, 0, 0, 0, 0x5C]);
        expected.extend(2i64.to_ne_bytes());
        assert_eq!(helper.buffer(), expected.as_slice());
        assert_eq!(def.need_second_call(), SecondCall::None);
    }

    #[test]
    fn test_store_lob_chunks() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::LBString, "LB", 0));
        def.create_values(true).unwrap();
        let text = "z".repeat(50_000);
        def.set_value("LB", &[], text.as_str()).unwrap();
        let mut option = def.buffer_option();
        let first = def.store_record_buffer(&mut option).unwrap();
        assert_eq!(first.max(), 40_960);
        assert_eq!(def.need_second_call(), SecondCall::StoreSecond);
        option.second_call = 1;
        let second = def.store_record_buffer(&mut option).unwrap();
        assert_eq!(second.max(), 50_000 - 40_960);
        assert_eq!(def.need_second_call(), SecondCall::None);
    }
}
