//! Depth-first traversal of type trees and value trees.
//!
//! Callbacks steer the walk through [`TraverseResult`]:
//! `SkipTree` does not descend into the node just visited, `SkipStructure`
//! drops the remaining siblings at the current level and `EndTraverser`
//! stops the walk.

use crate::fdt::{TypeId, TypeTree};
use crate::value::{AdaValue, StructureValue};
use crate::Result;

/// Outcome of a traversal callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseResult {
    /// Keep walking.
    Continue,
    /// Skip the remaining siblings of the current node.
    SkipStructure,
    /// Do not descend into the current node.
    SkipTree,
    /// Abort the traversal.
    EndTraverser,
}

// ── Types ──────────────────────────────────────────────────────────

/// Visit the descendants of `start`, parents before children.
///
/// `leave` runs after the children of every structure that was entered.
pub fn traverse_types<E, L>(tree: &TypeTree, start: TypeId, enter: &mut E, leave: &mut L) -> Result<TraverseResult>
where
    E: FnMut(&TypeTree, TypeId) -> Result<TraverseResult>,
    L: FnMut(&TypeTree, TypeId) -> Result<TraverseResult>,
{
    for child in tree.children(start) {
        match enter(tree, *child)? {
            TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
            TraverseResult::SkipStructure => return Ok(TraverseResult::Continue),
            TraverseResult::SkipTree => continue,
            TraverseResult::Continue => {}
        }
        if !tree.get(*child).is_structure() {
            continue;
        }
        if traverse_types(tree, *child, enter, leave)? == TraverseResult::EndTraverser {
            return Ok(TraverseResult::EndTraverser);
        }
        match leave(tree, *child)? {
            TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
            TraverseResult::SkipStructure => return Ok(TraverseResult::Continue),
            _ => {}
        }
    }
    Ok(TraverseResult::Continue)
}

// ── Values ─────────────────────────────────────────────────────────

/// Visit a value forest depth first.
///
/// `element` runs at the start of each element of a structure with the
/// element index and the total number of elements.
pub fn traverse_values<E, L, C>(
    values: &[AdaValue],
    enter: &mut E,
    leave: &mut L,
    element: &mut C,
) -> Result<TraverseResult>
where
    E: FnMut(&AdaValue) -> Result<TraverseResult>,
    L: FnMut(&AdaValue) -> Result<TraverseResult>,
    C: FnMut(&StructureValue, u32, usize) -> Result<TraverseResult>,
{
    for value in values {
        match enter(value)? {
            TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
            TraverseResult::SkipStructure => return Ok(TraverseResult::Continue),
            TraverseResult::SkipTree => continue,
            TraverseResult::Continue => {}
        }
        let AdaValue::Structure(structure) = value else {
            continue;
        };
        let total = structure.nr_elements();
        for e in structure.elements() {
            match element(structure, e.index(), total)? {
                TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
                TraverseResult::SkipStructure => break,
                TraverseResult::SkipTree => continue,
                TraverseResult::Continue => {}
            }
            if traverse_values(e.values(), enter, leave, element)? == TraverseResult::EndTraverser {
                return Ok(TraverseResult::EndTraverser);
            }
        }
        match leave(value)? {
            TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
            TraverseResult::SkipStructure => return Ok(TraverseResult::Continue),
            _ => {}
        }
    }
    Ok(TraverseResult::Continue)
}

/// Visit a value forest depth first with mutable access.
pub fn traverse_values_mut<E>(values: &mut [AdaValue], enter: &mut E) -> Result<TraverseResult>
where
    E: FnMut(&mut AdaValue) -> Result<TraverseResult>,
{
    for value in values.iter_mut() {
        match enter(value)? {
            TraverseResult::EndTraverser => return Ok(TraverseResult::EndTraverser),
            TraverseResult::SkipStructure => return Ok(TraverseResult::Continue),
            TraverseResult::SkipTree => continue,
            TraverseResult::Continue => {}
        }
        if let AdaValue::Structure(structure) = value {
            for e in structure.elements_mut() {
                if traverse_values_mut(e.values_mut(), enter)? == TraverseResult::EndTraverser {
                    return Ok(TraverseResult::EndTraverser);
                }
            }
        }
    }
    Ok(TraverseResult::Continue)
}

/// Continue for every node.
pub fn continue_types(_: &TypeTree, _: TypeId) -> Result<TraverseResult> {
    Ok(TraverseResult::Continue)
}

/// Continue for every value.
pub fn continue_values(_: &AdaValue) -> Result<TraverseResult> {
    Ok(TraverseResult::Continue)
}
