//! Per-node metadata computed by passes, stored alongside the AST rather
//! than inline in [`crate::ast::Expr`].
//!
//! Keeping derived facts (inferred types, visible label sets) out of the
//! enum means later passes can attach new metadata without changing every
//! match arm that builds or destructures an `Expr`, and means the side
//! table can be dropped wholesale once code generation is done with it.

use std::collections::HashMap;

use crate::ast::NodeId;

/// A node's result type, as tracked by [`crate::passes::types`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInfo {
    /// Derived by propagating other nodes' types through combinators; may
    /// still change as more of the fixed-point loop runs.
    Inferred(String),
    /// Pinned by an explicit `@type` annotation; propagation treats this as
    /// a boundary and never overwrites it.
    Fixed(String),
}

impl TypeInfo {
    /// The type name, regardless of whether it is fixed or inferred.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            TypeInfo::Inferred(name) | TypeInfo::Fixed(name) => name,
        }
    }

    /// Whether a new inference result is allowed to overwrite this one.
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        matches!(self, TypeInfo::Inferred(_))
    }
}

/// Metadata attached to one AST node.
#[derive(Debug, Clone, Default)]
pub struct NodeMeta {
    /// This node's result type, once [`crate::passes::types`] has visited it.
    pub ty: Option<TypeInfo>,
    /// Labels visible to action/predicate code running at this node,
    /// outermost-scope-first, as computed by [`crate::passes::actions`].
    /// Each entry names the label and the node it is bound to, so a later
    /// pass can look up that node's inferred type to build the label
    /// manifest the emitter needs (§4.4).
    pub visible_labels: Vec<(String, NodeId)>,
}

/// A side table of [`NodeMeta`], keyed by [`NodeId`].
///
/// One table is threaded through the whole pass pipeline for a single
/// compilation; nothing about it is grammar-specific beyond the `NodeId`s
/// it happens to have entries for.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    entries: HashMap<NodeId, NodeMeta>,
}

impl MetadataTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata recorded for `id`, if any pass has touched it yet.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeMeta> {
        self.entries.get(&id)
    }

    /// The entry for `id`, creating a default one if this is its first visit.
    pub fn entry(&mut self, id: NodeId) -> &mut NodeMeta {
        self.entries.entry(id).or_default()
    }

    /// The node's type, if one has been assigned.
    #[must_use]
    pub fn type_of(&self, id: NodeId) -> Option<&TypeInfo> {
        self.entries.get(&id).and_then(|m| m.ty.as_ref())
    }

    /// Assigns `id`'s type, respecting [`TypeInfo::is_overridable`]: a
    /// `Fixed` type already on record is never replaced.
    ///
    /// Returns `true` if the assignment changed the recorded type — the
    /// fixed-point inference loop in [`crate::passes::types`] uses this to
    /// decide when to stop iterating.
    /// Builds the `(label, nodeId, type)` manifest for an action/predicate
    /// node, resolving each bound label's type (`"any"` if inference never
    /// reached it, which only happens for a node unreachable from the start
    /// rule).
    #[must_use]
    pub fn label_manifest(&self, id: NodeId) -> Vec<(String, NodeId, String)> {
        let Some(meta) = self.get(id) else {
            return Vec::new();
        };
        meta.visible_labels
            .iter()
            .map(|(label, bound_id)| {
                let ty = self
                    .type_of(*bound_id)
                    .map_or_else(|| "any".to_string(), |t| t.type_name().to_string());
                (label.clone(), *bound_id, ty)
            })
            .collect()
    }

    /// Records the inferred type for `id`, returning `true` if the stored
    /// type changed as a result.
    pub fn set_type(&mut self, id: NodeId, ty: TypeInfo) -> bool {
        let entry = self.entries.entry(id).or_default();
        match &entry.ty {
            Some(existing) if !existing.is_overridable() => false,
            Some(existing) if *existing == ty => false,
            _ => {
                entry.ty = Some(ty);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_types_resist_overwrite() {
        let mut table = MetadataTable::new();
        let id = NodeId(0);
        assert!(table.set_type(id, TypeInfo::Fixed("Any".to_string())));
        assert!(!table.set_type(id, TypeInfo::Inferred("String".to_string())));
        assert_eq!(table.type_of(id).unwrap().type_name(), "Any");
    }

    #[test]
    fn inferred_types_converge_and_report_change() {
        let mut table = MetadataTable::new();
        let id = NodeId(1);
        assert!(table.set_type(id, TypeInfo::Inferred("String".to_string())));
        assert!(!table.set_type(id, TypeInfo::Inferred("String".to_string())));
        assert!(table.set_type(id, TypeInfo::Inferred("Node".to_string())));
    }
}
