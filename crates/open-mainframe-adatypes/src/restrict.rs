//! Restriction planner.
//!
//! A query such as `AA,PE[1],MU[2,N],#AB,@AC,LB(1,100)` prunes the file
//! tree into the active tree. Requested structures keep their whole
//! subtree; ancestors of every requested node are kept so the shape stays
//! valid, and partially kept structures are marked `PART`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::definition::Definition;
use crate::fdt::{AdaType, TypeId, TypeTree};
use crate::kind::{FieldKind, TypeFlags};
use crate::range::{AdaRange, PartialRange, LAST_ENTRY};
use crate::{AdaError, Result};

static QUERY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^\[\(\]\),]+(\[[\dN]+,?[\dN]*\])?(\(\d+,\d+\))?),?").expect("static query regex")
});

static FIELD_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<prefix>[@#]?)(?P<field>[^\[\]\(\),@#]+)(?:\[(?P<if>\d+|N)(?:,(?P<it>\d+|N))?\])?(?:\((?P<ps>\d+),(?P<pt>\d+)\))?$",
    )
    .expect("static field regex")
});

/// What a query token asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// The stored value.
    Value,
    /// Only the length or occurrence count (`#NAME`).
    Length,
    /// A symbolic reference (`@NAME`).
    Reference,
}

/// One parsed query token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    /// Long or short field name.
    pub name: String,
    /// Requested form.
    pub request: Request,
    /// First bracket index; [`LAST_ENTRY`] for `N`.
    pub first: Option<i32>,
    /// Second bracket index.
    pub second: Option<i32>,
    /// Byte slice `(start,length)`.
    pub partial: Option<PartialRange>,
}

fn parse_index(text: Option<regex::Match<'_>>, token: &str) -> Result<Option<i32>> {
    let Some(m) = text else {
        return Ok(None);
    };
    if m.as_str() == "N" {
        return Ok(Some(LAST_ENTRY));
    }
    match m.as_str().parse::<i32>() {
        Ok(i) if i > 0 => Ok(Some(i)),
        _ => Err(AdaError::InvalidQuery {
            fragment: token.to_string(),
        }),
    }
}

/// Split a query into field tokens; `ISN` pseudo fields are dropped.
pub fn parse_query(query: &str) -> Result<Vec<FieldQuery>> {
    let compact: String = query.split_whitespace().collect();
    let mut covered = 0;
    let mut fields = Vec::new();
    for caps in QUERY_TOKEN.captures_iter(&compact) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() != covered {
            break;
        }
        covered = whole.end();
        let token = token.as_str();
        let parts = FIELD_TOKEN.captures(token).ok_or_else(|| AdaError::InvalidQuery {
            fragment: token.to_string(),
        })?;
        let name = parts.name("field").map_or("", |m| m.as_str());
        if name == "ISN" {
            continue;
        }
        let request = match parts.name("prefix").map_or("", |m| m.as_str()) {
            "#" => Request::Length,
            "@" => Request::Reference,
            _ => Request::Value,
        };
        let partial = match (parts.name("ps"), parts.name("pt")) {
            (Some(start), Some(length)) => {
                let start = start.as_str().parse::<u32>().ok();
                let length = length.as_str().parse::<u32>().ok();
                match (start, length) {
                    (Some(s), Some(l)) if s > 0 => Some(PartialRange::new(s, l)),
                    _ => {
                        return Err(AdaError::InvalidQuery {
                            fragment: token.to_string(),
                        })
                    }
                }
            }
            _ => None,
        };
        fields.push(FieldQuery {
            name: name.to_string(),
            request,
            first: parse_index(parts.name("if"), token)?,
            second: parse_index(parts.name("it"), token)?,
            partial,
        });
    }
    if covered != compact.len() {
        return Err(AdaError::InvalidQuery {
            fragment: compact[covered..].to_string(),
        });
    }
    Ok(fields)
}

struct Plan {
    keep: HashSet<TypeId>,
    references: HashSet<TypeId>,
    map: HashMap<TypeId, TypeId>,
}

impl Plan {
    fn copy_children(&mut self, file: &TypeTree, active: &mut TypeTree, file_parent: TypeId, active_parent: TypeId) {
        let mut partial = false;
        for child in file.children(file_parent) {
            let ty = file.get(*child);
            if self.references.contains(child) {
                let name = format!("@{}", ty.name());
                let mut reference = AdaType::with_length(FieldKind::String, name, 0);
                reference.add_flag(TypeFlags::REFERENCE);
                active.add(active_parent, reference);
            }
            if !self.keep.contains(child) {
                partial = true;
                continue;
            }
            let id = active.add(active_parent, ty.clone());
            self.map.insert(*child, id);
            if ty.is_structure() {
                self.copy_children(file, active, *child, id);
            }
        }
        if partial && active_parent != TypeTree::ROOT {
            active.get_mut(active_parent).add_flag(TypeFlags::PART);
        }
    }
}

fn set_subtree_pe(active: &mut TypeTree, id: TypeId, range: AdaRange) {
    active.get_mut(id).set_pe_range(range);
    for child in active.preorder(id) {
        active.get_mut(child).set_pe_range(range);
    }
}

fn apply_index(active: &mut TypeTree, id: TypeId, query: &FieldQuery) -> Result<()> {
    let Some(first) = query.first else {
        return Ok(());
    };
    let ty = active.get(id);
    let in_pe = ty.has_flag(TypeFlags::PE);
    let is_mu = ty.kind() == FieldKind::MultipleField || ty.has_flag(TypeFlags::MU);
    let mu_nodes: Vec<TypeId> = std::iter::once(id)
        .chain(active.children(id).iter().copied())
        .collect();
    let invalid = || AdaError::InvalidQuery {
        fragment: query.name.clone(),
    };
    match (ty.kind(), in_pe, is_mu) {
        (FieldKind::PeriodGroup, _, _) => {
            if query.second.is_some() {
                return Err(invalid());
            }
            set_subtree_pe(active, id, AdaRange::single(first));
        }
        (_, true, true) => {
            for node in &mu_nodes {
                active.get_mut(*node).set_pe_range(AdaRange::single(first));
                if let Some(second) = query.second {
                    active.get_mut(*node).set_mu_range(AdaRange::single(second));
                }
            }
        }
        (_, false, true) => {
            if query.second.is_some() {
                return Err(invalid());
            }
            for node in &mu_nodes {
                active.get_mut(*node).set_mu_range(AdaRange::single(first));
            }
        }
        (_, true, false) => {
            if query.second.is_some() {
                return Err(invalid());
            }
            set_subtree_pe(active, id, AdaRange::single(first));
        }
        (_, false, false) => {
            return Err(AdaError::IndexOnNonMultiple {
                name: query.name.clone(),
            })
        }
    }
    Ok(())
}

/// Mark leaves whose ranges collapse to one occurrence, then the PE and MU
/// structures whose kept leaves all collapse.
fn mark_single_index(active: &mut TypeTree) {
    let nodes = active.preorder(TypeTree::ROOT);
    for id in &nodes {
        let ty = active.get(*id);
        if ty.is_structure() || ty.has_flag(TypeFlags::REFERENCE) {
            continue;
        }
        let in_pe = ty.has_flag(TypeFlags::PE);
        let in_mu = ty.has_flag(TypeFlags::MU);
        let single = (in_pe || in_mu)
            && (!in_pe || ty.pe_range().is_single_index())
            && (!in_mu || ty.mu_range().is_single_index());
        if single {
            active.get_mut(*id).add_flag(TypeFlags::SINGLE_INDEX);
        }
    }
    for id in nodes.iter().rev() {
        let ty = active.get(*id);
        if !ty.is_structure() || !(ty.has_flag(TypeFlags::PE) || ty.has_flag(TypeFlags::MU)) {
            continue;
        }
        let leaves = active.leaves(*id);
        let all_single = !leaves.is_empty()
            && leaves.iter().all(|leaf| {
                let leaf = active.get(*leaf);
                leaf.has_flag(TypeFlags::SINGLE_INDEX) || leaf.has_flag(TypeFlags::REFERENCE)
            });
        if all_single {
            active.get_mut(*id).add_flag(TypeFlags::SINGLE_INDEX);
        } else {
            active.get_mut(*id).remove_flag(TypeFlags::SINGLE_INDEX);
        }
    }
}

impl Definition {
    /// Restrict the active tree to the fields named in `query`.
    ///
    /// An empty query or `*` restores the full file tree.
    pub fn restrict_to_fields(&mut self, query: &str) -> Result<()> {
        let trimmed = query.trim();
        if trimmed.is_empty() || trimmed == "*" {
            self.set_active_tree(self.file_tree().clone());
            debug!("restriction reset to all fields");
            return Ok(());
        }
        let queries = parse_query(trimmed)?;
        let file = self.file_tree();

        let mut plan = Plan {
            keep: HashSet::new(),
            references: HashSet::new(),
            map: HashMap::new(),
        };
        let mut resolved = Vec::with_capacity(queries.len());
        for query in &queries {
            let id = self
                .search_file_type_id(&query.name)
                .ok_or_else(|| AdaError::UnknownField {
                    name: query.name.clone(),
                })?;
            resolved.push(id);
            match query.request {
                Request::Length => continue,
                Request::Reference => {
                    plan.references.insert(id);
                }
                Request::Value => {
                    plan.keep.insert(id);
                    plan.keep.extend(file.preorder(id));
                }
            }
            plan.keep.extend(file.ancestors(id));
        }

        let mut active = TypeTree::new();
        plan.copy_children(file, &mut active, TypeTree::ROOT, TypeTree::ROOT);

        for (query, file_id) in queries.iter().zip(&resolved) {
            if query.request != Request::Value {
                continue;
            }
            let Some(id) = plan.map.get(file_id).copied() else {
                continue;
            };
            apply_index(&mut active, id, query)?;
            if query.partial.is_some() {
                active.get_mut(id).set_partial_range(query.partial);
            }
        }
        mark_single_index(&mut active);

        let mut position = 0;
        for (query, file_id) in queries.iter().zip(&resolved) {
            if query.request != Request::Length {
                continue;
            }
            let ty = file.get(*file_id);
            let counted = matches!(ty.kind(), FieldKind::PeriodGroup | FieldKind::MultipleField);
            let suffix = if counted { 'C' } else { 'L' };
            let mut length = AdaType::new(FieldKind::FieldLength, format!("{}{suffix}", ty.short_name()))
                .with_short_name(ty.short_name());
            if counted {
                length.add_flag(TypeFlags::LENGTH_PE);
            }
            active.insert(TypeTree::ROOT, position, length);
            position += 1;
        }

        debug!(
            query = %trimmed,
            fields = queries.len(),
            nodes = active.len() - 1,
            "restricted active tree"
        );
        self.set_active_tree(active);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::tests::period_definition;

    fn leaf_names(def: &Definition) -> Vec<String> {
        let tree = def.active_tree();
        tree.preorder(TypeTree::ROOT)
            .into_iter()
            .map(|id| tree.get(id).name().to_string())
            .collect()
    }

    #[test]
    fn test_parse_query() {
        let q = parse_query("AA,PE[1],MU[2,N],#AB,@AC,LB(1,100),#ISN").unwrap();
        assert_eq!(q.len(), 6);
        assert_eq!(q[1].first, Some(1));
        assert_eq!((q[2].first, q[2].second), (Some(2), Some(LAST_ENTRY)));
        assert_eq!(q[3].request, Request::Length);
        assert_eq!(q[4].request, Request::Reference);
        assert_eq!(q[5].partial, Some(PartialRange::new(1, 100)));
    }

    #[test]
    fn test_parse_query_rejects_garbage() {
        assert!(matches!(parse_query("AA,BB[0]"), Err(AdaError::InvalidQuery { .. })));
        assert!(matches!(parse_query("AA,(1,2)"), Err(AdaError::InvalidQuery { .. })));
    }

    #[test]
    fn test_star_keeps_shape() {
        let mut def = period_definition();
        def.restrict_to_fields("U4").unwrap();
        def.restrict_to_fields("*").unwrap();
        assert_eq!(def.dump_types(true), def.dump_types(false));
    }

    #[test]
    fn test_keep_ancestors_and_part() {
        let mut def = period_definition();
        def.restrict_to_fields("U4,GC").unwrap();
        assert_eq!(leaf_names(&def), ["U4", "PG", "GC"]);
        let pg = def.search_type("PG").unwrap();
        assert!(pg.has_flag(TypeFlags::PART));
        assert!(!pg.has_flag(TypeFlags::SINGLE_INDEX));
    }

    #[test]
    fn test_structure_keeps_subtree() {
        let mut def = period_definition();
        def.restrict_to_fields("PG").unwrap();
        assert_eq!(leaf_names(&def), ["PG", "GC", "GM", "GM"]);
        assert!(!def.search_type("PG").unwrap().has_flag(TypeFlags::PART));
    }

    #[test]
    fn test_unknown_field() {
        let mut def = period_definition();
        let err = def.restrict_to_fields("U4,XX").unwrap_err();
        assert_eq!(err.code(), 50);
        assert!(matches!(
            def.restrict_to_fields("U4[1]"),
            Err(AdaError::IndexOnNonMultiple { .. })
        ));
    }

    #[test]
    fn test_length_and_reference() {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "U4"));
        def.append(AdaType::with_length(FieldKind::String, "GS", 0));
        def.restrict_to_fields("#ISN,U4,#GS,@GS").unwrap();
        assert_eq!(leaf_names(&def), ["GSL", "U4", "@GS"]);
        let gsl = def.search_type("GSL").unwrap();
        assert_eq!(gsl.kind(), FieldKind::FieldLength);
        assert_eq!(gsl.short_name(), "GS");
        let reference = def.search_type("@GS").unwrap();
        assert!(reference.has_flag(TypeFlags::REFERENCE));
        assert_eq!(reference.length(), 0);
    }

    #[test]
    fn test_period_count_request() {
        let mut def = period_definition();
        def.restrict_to_fields("#PG").unwrap();
        let pgc = def.search_type("PGC").unwrap();
        assert!(pgc.has_flag(TypeFlags::LENGTH_PE));
    }

    #[test]
    fn test_multiple_in_period_index() {
        let mut def = period_definition();
        def.restrict_to_fields("GM[1,2]").unwrap();
        let id = def.search_type_id("GM").unwrap();
        let tree = def.active_tree();
        let leaf = tree.get(tree.children(id)[0]);
        assert_eq!(leaf.pe_range(), AdaRange::single(1));
        assert_eq!(leaf.mu_range(), AdaRange::single(2));
        assert!(leaf.has_flag(TypeFlags::SINGLE_INDEX));
        assert!(def.search_type("PG").unwrap().has_flag(TypeFlags::SINGLE_INDEX));
    }

    #[test]
    fn test_last_occurrence() {
        let mut def = period_definition();
        def.restrict_to_fields("GC[N]").unwrap();
        let gc = def.search_type("GC").unwrap();
        assert!(gc.pe_range().is_last());
        assert!(gc.has_flag(TypeFlags::SINGLE_INDEX));
    }

    #[test]
    fn test_partial_range() {
        let mut def = Definition::new();
        def.append(AdaType::with_length(FieldKind::LBString, "LB", 0));
        def.restrict_to_fields("LB(1,100)").unwrap();
        assert_eq!(def.search_type("LB").unwrap().partial_range(), Some(PartialRange::new(1, 100)));
    }
}
