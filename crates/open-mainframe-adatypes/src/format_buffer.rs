//! Format buffer generation.
//!
//! The read format buffer is derived from the active type tree alone; store
//! and second-call format buffers walk the value tree. Every generator also
//! estimates the record buffer length the server needs for the answer.

use tracing::debug;

use crate::buffer::{BufferHelper, Endian};
use crate::definition::Definition;
use crate::fdt::{AdaType, TypeId, TypeTree};
use crate::kind::{FieldKind, FieldOptions, TypeFlags};
use crate::parser::BufferOption;
use crate::traverse::{self, TraverseResult};
use crate::value::{AdaValue, FieldData, FieldValue};
use crate::{AdaError, Result};

/// Which format buffer to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// First read call, from the active tree.
    Read,
    /// Store call, from the value tree.
    Store,
    /// Follow-up read for MU fields in period groups and partial LOBs.
    SecondCall,
}

/// Generated format buffer with the record buffer size it calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatBufferRequest {
    /// Comma separated format buffer terminated by `.`.
    pub format_buffer: String,
    /// Record buffer bytes to allocate (read) or written (store).
    pub record_buffer_length: u32,
}

impl std::fmt::Display for FormatBufferRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_buffer)
    }
}

#[derive(Default)]
struct Builder {
    format_buffer: String,
    record_buffer_length: u32,
}

impl Builder {
    fn push(&mut self, token: &str, length: u32) {
        if !self.format_buffer.is_empty() {
            self.format_buffer.push(',');
        }
        self.format_buffer.push_str(token);
        self.record_buffer_length = self.record_buffer_length.saturating_add(length);
    }

    fn finish(mut self) -> FormatBufferRequest {
        self.format_buffer.push('.');
        FormatBufferRequest {
            format_buffer: self.format_buffer,
            record_buffer_length: self.record_buffer_length,
        }
    }
}

// ── Read mode ──────────────────────────────────────────────────────

/// A period group can be requested as a whole `PG1-N` block.
pub(crate) fn collapsible(tree: &TypeTree, id: TypeId) -> bool {
    let ty = tree.get(id);
    if ty.has_flag(TypeFlags::ATOMIC_FB) || ty.has_flag(TypeFlags::PART) || ty.has_flag(TypeFlags::SINGLE_INDEX) {
        return false;
    }
    tree.preorder(id).into_iter().all(|c| {
        let child = tree.get(c);
        child.kind() != FieldKind::MultipleField
            && child.partial_range().is_none()
            && !(child.kind().is_lob() && child.length() == 0)
            && !child.has_flag(TypeFlags::REFERENCE)
    })
}

fn pe_suffix(ty: &AdaType) -> String {
    if ty.has_flag(TypeFlags::PE) {
        ty.pe_range().format_buffer()
    } else {
        String::new()
    }
}

fn read_leaf(builder: &mut Builder, ty: &AdaType, option: &BufferOption, variable_estimate: u32, multiple_size: u32) {
    let short = ty.short_name();
    let index = pe_suffix(ty);
    if let Some(partial) = ty.partial_range() {
        builder.push(&format!("{short}{index}{}", partial.format_buffer()), partial.length);
        return;
    }
    if ty.kind().is_lob() && ty.length() == 0 {
        let block = option.partial_lob_size;
        builder.push(&format!("{short}{index}L,4,{short}{index}(1,{block})"), 4 + block);
        return;
    }
    let estimate = if ty.has_flag(TypeFlags::PE) && !ty.has_flag(TypeFlags::SINGLE_INDEX) {
        multiple_size
    } else if ty.length() == 0 {
        variable_estimate
    } else {
        ty.length()
    };
    builder.push(
        &format!("{short}{index},{},{}", ty.length(), ty.format_character()),
        estimate,
    );
}

fn read_enter(
    builder: &mut Builder,
    tree: &TypeTree,
    id: TypeId,
    option: &BufferOption,
    variable_estimate: u32,
    multiple_size: u32,
) -> TraverseResult {
    let ty = tree.get(id);
    if ty.has_flag(TypeFlags::REFERENCE) {
        return TraverseResult::Continue;
    }
    let short = ty.short_name();
    match ty.kind() {
        FieldKind::PeriodGroup => {
            if !ty.has_flag(TypeFlags::SINGLE_INDEX) {
                builder.push(&format!("{short}C,4,B"), 4);
            }
            if collapsible(tree, id) {
                builder.push(&format!("{short}{}", ty.pe_range()), multiple_size);
                return TraverseResult::SkipTree;
            }
            TraverseResult::Continue
        }
        FieldKind::MultipleField => {
            let Some(leaf) = tree.children(id).first().map(|c| tree.get(*c)) else {
                return TraverseResult::SkipTree;
            };
            let single = leaf.has_flag(TypeFlags::SINGLE_INDEX);
            let width = if leaf.length() == 0 {
                variable_estimate
            } else {
                leaf.length()
            };
            let entry = format!("{},{}", leaf.length(), leaf.format_character());
            if ty.has_flag(TypeFlags::PE) {
                // without a single index the occurrences come with the second call
                if single {
                    builder.push(&format!("{short}{}({}),{entry}", leaf.pe_range(), leaf.mu_range()), width);
                }
            } else if single {
                builder.push(&format!("{short}{},{entry}", leaf.mu_range()), width);
            } else {
                builder.push(&format!("{short}C,4,B"), 4);
                builder.push(&format!("{short}{},{entry}", leaf.mu_range()), multiple_size);
            }
            TraverseResult::SkipTree
        }
        FieldKind::Group | FieldKind::Structure => TraverseResult::Continue,
        FieldKind::FieldLength => {
            let suffix = if ty.has_flag(TypeFlags::LENGTH_PE) { 'C' } else { 'L' };
            builder.push(&format!("{short}{suffix},4,B"), 4);
            TraverseResult::Continue
        }
        FieldKind::SuperDesc | FieldKind::HyperDesc => {
            if !ty.has_option(FieldOptions::PE) && !ty.has_flag(TypeFlags::PE) {
                builder.push(&format!("{short},{}", ty.length()), ty.length());
            }
            TraverseResult::Continue
        }
        FieldKind::Phonetic | FieldKind::Collation | FieldKind::Referential | FieldKind::Filler => {
            TraverseResult::Continue
        }
        _ => {
            read_leaf(builder, ty, option, variable_estimate, multiple_size);
            TraverseResult::Continue
        }
    }
}

// ── Store mode ─────────────────────────────────────────────────────

fn index_suffix(pe: u32, mu: u32) -> String {
    match (pe, mu) {
        (0, 0) => String::new(),
        (p, 0) => p.to_string(),
        (0, m) => m.to_string(),
        (p, m) => format!("{p}({m})"),
    }
}

/// Whether a leaf value takes part in a store record buffer.
pub(crate) fn is_stored(value: &FieldValue) -> bool {
    let ty = value.ty();
    !(ty.has_flag(TypeFlags::REFERENCE)
        || ty.is_special_descriptor()
        || ty.is_structure()
        || matches!(ty.kind(), FieldKind::FieldLength | FieldKind::Filler))
}

/// Byte range of the LOB chunk sent with store call `option.second_call`,
/// `None` when the value fits one block.
pub(crate) fn lob_chunk(value: &FieldValue, option: &BufferOption) -> Option<(usize, usize)> {
    let ty = value.ty();
    if !ty.kind().is_lob() || ty.length() != 0 {
        return None;
    }
    let FieldData::Alpha { bytes, .. } = value.data() else {
        return None;
    };
    let total = bytes.len();
    let block = option.store_lob_block as usize;
    if block == 0 || total <= block {
        return None;
    }
    let start = option.second_call as usize * block;
    Some((start.min(total), (start + block).min(total)))
}

/// Store format buffer token of `value` and its record buffer bytes.
pub(crate) fn store_token(value: &FieldValue, option: &BufferOption) -> Result<Option<(String, u32)>> {
    if !is_stored(value) {
        return Ok(None);
    }
    let ty = value.ty();
    let short = ty.short_name();
    let index = index_suffix(value.pe_index(), value.mu_index());
    if let Some((start, end)) = lob_chunk(value, option) {
        if start >= end {
            return Ok(None);
        }
        let length = (end - start) as u32;
        return Ok(Some((format!("{short}{index}({},{length})", start + 1), length)));
    }
    if option.second_call > 0 {
        return Ok(None);
    }
    let mut scratch = BufferHelper::for_writing(Endian::Little);
    let mut scratch_option = option.clone();
    value.store_buffer(&mut scratch, &mut scratch_option)?;
    Ok(Some((
        format!("{short}{index},{},{}", ty.length(), ty.format_character()),
        scratch.max() as u32,
    )))
}

// ── Second call ────────────────────────────────────────────────────

/// Loaded and missing bytes of a partially read LOB.
pub(crate) fn missing_lob(field: &FieldValue) -> Option<(u32, u32)> {
    let ty = field.ty();
    if !ty.kind().is_lob() || ty.length() != 0 || ty.partial_range().is_some() {
        return None;
    }
    let FieldData::Alpha { bytes, lob_size } = field.data() else {
        return None;
    };
    let loaded = bytes.len() as u32;
    (*lob_size > loaded).then(|| (loaded, lob_size - loaded))
}

fn second_call_enter(builder: &mut Builder, tree: &TypeTree, value: &AdaValue, multiple_size: u32) -> TraverseResult {
    match value {
        AdaValue::Structure(structure) => {
            let ty = structure.ty();
            if ty.kind() != FieldKind::MultipleField || !ty.has_flag(TypeFlags::PE) {
                return TraverseResult::Continue;
            }
            let leaf = structure
                .type_id()
                .and_then(|id| tree.children(id).first().copied())
                .map(|id| tree.get(id));
            let Some(leaf) = leaf else {
                return TraverseResult::SkipTree;
            };
            if leaf.has_flag(TypeFlags::SINGLE_INDEX) {
                return TraverseResult::SkipTree;
            }
            let short = ty.short_name();
            let pe = structure.pe_index();
            builder.push(&format!("{short}{pe}C,4,B"), 4);
            builder.push(
                &format!("{short}{pe}({}),{}", leaf.mu_range(), leaf.length()),
                multiple_size,
            );
            TraverseResult::SkipTree
        }
        AdaValue::Field(field) => {
            if let Some((loaded, missing)) = missing_lob(field) {
                let index = index_suffix(field.pe_index(), field.mu_index());
                builder.push(
                    &format!("{}{index}({},{missing})", field.ty().short_name(), loaded + 1),
                    missing,
                );
            }
            TraverseResult::Continue
        }
    }
}

impl Definition {
    /// Buffer options from this definition's configuration.
    pub fn buffer_option(&self) -> BufferOption {
        BufferOption::new(self.config())
    }

    /// Generate the format buffer for `mode`.
    ///
    /// Store and second-call buffers need a value tree. For LOB stores
    /// larger than one block `option.second_call` selects the chunk.
    pub fn create_format_buffer(&self, mode: RequestMode, option: &BufferOption) -> Result<FormatBufferRequest> {
        let buffer_config = &self.config().buffer;
        let variable_estimate = buffer_config.variable_length_estimate;
        let multiple_size = buffer_config.multiple_size;
        let mut builder = Builder::default();
        match mode {
            RequestMode::Read => {
                self.traverse_types(
                    true,
                    &mut |tree, id| {
                        Ok(read_enter(&mut builder, tree, id, option, variable_estimate, multiple_size))
                    },
                    &mut traverse::continue_types,
                )?;
            }
            RequestMode::Store => {
                let values = self.values().ok_or(AdaError::NoValues)?;
                traverse::traverse_values(
                    values,
                    &mut |value| {
                        if let AdaValue::Field(field) = value {
                            if let Some((token, length)) = store_token(field, option)? {
                                builder.push(&token, length);
                            }
                        }
                        Ok(TraverseResult::Continue)
                    },
                    &mut traverse::continue_values,
                    &mut |_, _, _| Ok(TraverseResult::Continue),
                )?;
            }
            RequestMode::SecondCall => {
                let values = self.values().ok_or(AdaError::NoValues)?;
                let tree = self.active_tree();
                traverse::traverse_values(
                    values,
                    &mut |value| Ok(second_call_enter(&mut builder, tree, value, multiple_size)),
                    &mut traverse::continue_values,
                    &mut |_, _, _| Ok(TraverseResult::Continue),
                )?;
            }
        }
        let request = builder.finish();
        debug!(
            ?mode,
            format_buffer = %request.format_buffer,
            record_buffer_length = request.record_buffer_length,
            "generated format buffer"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::tests::period_definition;

    fn read(def: &Definition) -> FormatBufferRequest {
        def.create_format_buffer(RequestMode::Read, &def.buffer_option()).unwrap()
    }

    #[test]
    fn test_flat_and_group() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.append(AdaType::new(FieldKind::Byte, "B1"));
        def.append(AdaType::new(FieldKind::UByte, "UB"));
        def.append(AdaType::new(FieldKind::Int2, "I2"));
        def.append(AdaType::new(FieldKind::UInt8, "U8"));
        let gr = def.append(AdaType::structure(FieldKind::Group, "GR"));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "G1", 1));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GX", 1));
        def.add_child(gr, AdaType::with_length(FieldKind::Packed, "PA", 1));
        def.append(AdaType::new(FieldKind::Int8, "I8"));
        let request = read(&def);
        assert_eq!(
            request.format_buffer,
            "U4,4,B,B1,1,F,UB,1,B,I2,2,F,U8,8,B,G1,1,A,GX,1,A,PA,1,P,I8,8,F."
        );
        assert_eq!(request.record_buffer_length, 4 + 1 + 1 + 2 + 8 + 1 + 1 + 1 + 8);
    }

    #[test]
    fn test_collapsed_period() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt8, "U8"));
        let pg = def.append(AdaType::structure(FieldKind::PeriodGroup, "PG"));
        def.add_child(pg, AdaType::with_length(FieldKind::String, "P1", 2));
        def.add_child(pg, AdaType::new(FieldKind::UInt4, "P2"));
        def.append(AdaType::new(FieldKind::Int8, "I8"));
        let request = read(&def);
        assert_eq!(request.format_buffer, "U8,8,B,PGC,4,B,PG1-N,I8,8,F.");
        assert_eq!(request.record_buffer_length, 8 + 4 + 2048 + 8);
    }

    #[test]
    fn test_multiple_field() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.add_multiple(TypeTree::ROOT, AdaType::with_length(FieldKind::Packed, "GM", 1));
        def.append(AdaType::with_length(FieldKind::String, "GS", 1));
        assert_eq!(read(&def).format_buffer, "U4,4,B,GMC,4,B,GM1-N,1,P,GS,1,A.");
    }

    #[test]
    fn test_period_with_multiple() {
        let def = period_definition();
        assert_eq!(read(&def).format_buffer, "U4,4,B,PGC,4,B,GC1-N,1,A,I8,8,F.");
    }

    #[test]
    fn test_large_object() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.append(AdaType::new(FieldKind::Character, "CH"));
        def.append(AdaType::with_length(FieldKind::LBString, "LB", 0));
        def.append(AdaType::with_length(FieldKind::String, "ST", 0));
        def.append(AdaType::new(FieldKind::UByte, "UB"));
        let request = read(&def);
        assert_eq!(request.format_buffer, "U4,4,B,CH,1,A,LBL,4,LB(1,4096),ST,0,A,UB,1,B.");
        assert_eq!(request.record_buffer_length, 4 + 1 + 4 + 4096 + 512 + 1);
    }

    #[test]
    fn test_length_and_reference_request() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.append(AdaType::with_length(FieldKind::String, "GS", 0));
        def.restrict_to_fields("#ISN,U4,#GS,@GS").unwrap();
        assert_eq!(read(&def).format_buffer, "GSL,4,B,U4,4,B.");
    }

    #[test]
    fn test_single_index_collapse() {
        let mut def = Definition::new();
        let pe = def.append(AdaType::structure(FieldKind::PeriodGroup, "PE"));
        def.add_child(pe, AdaType::with_length(FieldKind::String, "PA", 2));
        def.add_multiple(pe, AdaType::with_length(FieldKind::String, "PM", 10));
        def.restrict_to_fields("PM[1,2]").unwrap();
        let fb = read(&def).format_buffer;
        assert_eq!(fb, "PM1(2),10,A.");
        assert!(!fb.contains("C,4"));
    }

    #[test]
    fn test_last_occurrence() {
        let mut def = Definition::new();
        let gr = def.append(AdaType::structure(FieldKind::PeriodGroup, "GR"));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GS", 1));
        def.add_child(gr, AdaType::with_length(FieldKind::String, "GT", 1));
        def.restrict_to_fields("GS[N]").unwrap();
        assert_eq!(read(&def).format_buffer, "GSN,1,A.");
    }

    #[test]
    fn test_descriptors() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::String, "AA", 4));
        def.append(AdaType::super_desc("S1", vec![crate::fdt::SuperEntry::new("AA", 1, 2)]));
        def.append(AdaType::phonetic("PH", 20, "AA"));
        assert_eq!(read(&def).format_buffer, "AA,4,A,S1,2.");
    }

    #[test]
    fn test_store_buffer() {
        let mut def = period_definition();
        def.create_values(true).unwrap();
        def.set_value("U4", &[], 1).unwrap();
        def.set_value("GC", &[1], "a").unwrap();
        def.set_value("GM", &[1, 1], 5).unwrap();
        def.set_value("I8", &[], 2).unwrap();
        let request = def
            .create_format_buffer(RequestMode::Store, &def.buffer_option())
            .unwrap();
        assert_eq!(request.format_buffer, "U4,4,B,GC1,1,A,GM1(1),5,P,I8,8,F.");
        assert_eq!(request.record_buffer_length, 4 + 1 + 5 + 8);
    }

    #[test]
    fn test_store_requires_values() {
        let def = period_definition();
        let err = def
            .create_format_buffer(RequestMode::Store, &def.buffer_option())
            .unwrap_err();
        assert!(matches!(err, AdaError::NoValues));
    }

    #[test]
    fn test_store_large_object_chunks() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::LBString, "LB", 0));
        def.create_values(true).unwrap();
        let text = "x".repeat(160_000);
        def.set_value("LB", &[], text.as_str()).unwrap();
        let mut option = def.buffer_option();
        let fb = |option: &BufferOption| {
            def.create_format_buffer(RequestMode::Store, option)
                .unwrap()
                .format_buffer
        };
        assert_eq!(fb(&option), "LB(1,40960).");
        option.second_call = 1;
        assert_eq!(fb(&option), "LB(40961,40960).");
        option.second_call = 3;
        assert_eq!(fb(&option), "LB(122881,37120).");
        option.second_call = 4;
        assert_eq!(fb(&option), ".");
    }

    #[test]
    fn test_second_call_multiple_in_period() {
        let mut def = period_definition();
        def.restrict_to_fields("PG").unwrap();
        def.create_values(false).unwrap();
        def.search_value_by_index("GC", &[1], true).unwrap();
        let request = def
            .create_format_buffer(RequestMode::SecondCall, &def.buffer_option())
            .unwrap();
        assert_eq!(request.format_buffer, "GM1C,4,B,GM1(1-N),5.");
    }
}
