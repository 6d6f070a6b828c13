//! Structural checks over merged messages
//!
//! - reserved-field reuse across versions
//! - oneof groups that conflict rather than merely being renamed
//! - cycles of required message fields (no finite instance can exist)

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::align::AlignedField;
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::merged::{Cardinality, MergedOneof, MergedSchema, Repr};
use crate::schema::{join_path, MessageDef};
use crate::version::VersionId;

// =============================================================================
// Reserved Fields
// =============================================================================

/// Report fields that reuse a number or name reserved in the same or an
/// earlier version
pub fn check_reserved(path: &str, defs: &[(&VersionId, Option<&MessageDef>)], diagnostics: &mut Diagnostics) {
    for (j, (version, def)) in defs.iter().enumerate() {
        let Some(def) = def else { continue };
        for slot in &def.fields {
            let reserving = defs[..=j].iter().find_map(|(earlier, d)| {
                d.filter(|d| d.is_reserved(slot.number, &slot.name)).map(|_| *earlier)
            });
            if let Some(earlier) = reserving {
                diagnostics.push(
                    DiagnosticItem::new(
                        join_path(path, &slot.name),
                        DiagnosticCode::ReservedFieldReuse,
                        format!(
                            "Field '{}' #{} in {} reuses a number or name reserved in {}",
                            slot.name, slot.number, version, earlier
                        ),
                    )
                    .with_context(format!("reserved numbers in {}: {:?}", earlier, reserved_numbers(defs, earlier))),
                );
            }
        }
    }
}

fn reserved_numbers(defs: &[(&VersionId, Option<&MessageDef>)], version: &VersionId) -> Vec<u32> {
    defs.iter()
        .find(|(v, _)| *v == version)
        .and_then(|(_, d)| d.map(|d| d.reserved_numbers.clone()))
        .unwrap_or_default()
}

// =============================================================================
// Oneof Groups
// =============================================================================

/// Unified oneof membership for a message's aligned fields.
///
/// Returns one entry per field (its unified group name) and the merged
/// groups. A group renamed between versions takes the latest name; a field
/// that moves between groups existing side by side is a conflict.
pub fn unify_oneofs(
    path: &str,
    fields: &[AlignedField],
    diagnostics: &mut Diagnostics,
) -> (Vec<Option<String>>, Vec<MergedOneof>) {
    let mut membership: Vec<Option<String>> = Vec::with_capacity(fields.len());

    for field in fields {
        let mut names: Vec<&str> = Vec::new();
        for (_, slot) in &field.slots {
            if let Some(name) = slot.as_ref().and_then(|s| s.oneof.as_deref()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        if names.len() > 1 {
            let coexisting = field_versions_with_groups(fields, &names);
            if let Some(version) = coexisting {
                diagnostics.push(
                    DiagnosticItem::new(
                        join_path(path, &field.name),
                        DiagnosticCode::OneofConflict,
                        format!("Field '{}' moves between oneof groups {:?}", field.name, names),
                    )
                    .with_context(format!("groups coexist in {}", version)),
                );
            }
        }
        membership.push(names.last().map(|n| n.to_string()));
    }

    let mut groups: Vec<MergedOneof> = Vec::new();
    for (field, group) in fields.iter().zip(&membership) {
        let Some(group) = group else { continue };
        let index = match groups.iter().position(|g| &g.name == group) {
            Some(index) => index,
            None => {
                groups.push(MergedOneof { name: group.clone(), fields: Vec::new(), versions: Vec::new() });
                groups.len() - 1
            }
        };
        groups[index].fields.push(field.name.clone());
        for (version, slot) in &field.slots {
            let in_group = slot.as_ref().map(|s| s.oneof.is_some()).unwrap_or(false);
            if in_group && !groups[index].versions.contains(version) {
                groups[index].versions.push(version.clone());
            }
        }
    }

    (membership, groups)
}

/// First version in which two of `names` are both populated oneof groups
fn field_versions_with_groups(fields: &[AlignedField], names: &[&str]) -> Option<VersionId> {
    let versions = fields.first()?.slots.len();
    (0..versions).find_map(|vi| {
        let present: Vec<&str> = fields
            .iter()
            .filter_map(|f| f.slots[vi].1.as_ref().and_then(|s| s.oneof.as_deref()))
            .filter(|n| names.contains(n))
            .collect();
        let distinct = names.iter().filter(|n| present.contains(n)).count();
        (distinct > 1).then(|| fields[0].slots[vi].0.clone())
    })
}

// =============================================================================
// Required Cycles
// =============================================================================

/// Report cycles of required singular message fields, per version
pub fn check_required_cycles(schema: &MergedSchema, diagnostics: &mut Diagnostics) {
    for version in schema.versions.iter() {
        let mut graph: DiGraph<String, String> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut self_loops: Vec<String> = Vec::new();

        for message in schema.all_messages() {
            for field in &message.fields {
                let (Some(slot), Some(Repr::Message(target))) = (field.slot(version), field.repr(version)) else {
                    continue;
                };
                if !slot.is_required() || field.cardinality != Cardinality::Single {
                    continue;
                }
                if *target == message.path {
                    self_loops.push(message.path.clone());
                }
                let from = *nodes
                    .entry(message.path.clone())
                    .or_insert_with(|| graph.add_node(message.path.clone()));
                let to = *nodes
                    .entry(target.clone())
                    .or_insert_with(|| graph.add_node(target.clone()));
                graph.add_edge(from, to, field.name.clone());
            }
        }

        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().filter_map(|idx| graph.node_weight(idx).cloned()).collect();
                members.sort();
                members
            })
            .collect();
        self_loops.sort();
        self_loops.dedup();
        cycles.extend(self_loops.into_iter().map(|p| vec![p]));

        for cycle in cycles {
            let entity = cycle[0].clone();
            diagnostics.push(
                DiagnosticItem::new(
                    entity,
                    DiagnosticCode::CircularDependency,
                    format!("Required message fields form a cycle in {}", version),
                )
                .with_context(format!("cycle: {}", cycle.join(" -> "))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSlot, ScalarType};

    #[test]
    fn test_reserved_reuse_detected() {
        let v1 = MessageDef::new("Order").reserve(4);
        let v2 = MessageDef::new("Order").field(FieldSlot::new("coupon", 4, FieldKind::Scalar(ScalarType::String)));
        let ids: [VersionId; 2] = ["v1".into(), "v2".into()];
        let defs = vec![(&ids[0], Some(&v1)), (&ids[1], Some(&v2))];
        let mut diags = Diagnostics::new();

        check_reserved("Order", &defs, &mut diags);

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.all()[0].entity, "Order.coupon");
        assert!(diags.blocked_entities().contains("Order"));
    }

    #[test]
    fn test_reserved_in_later_version_is_fine() {
        let v1 = MessageDef::new("Order").field(FieldSlot::new("coupon", 4, FieldKind::Scalar(ScalarType::String)));
        let v2 = MessageDef::new("Order").reserve(4);
        let ids: [VersionId; 2] = ["v1".into(), "v2".into()];
        let defs = vec![(&ids[0], Some(&v1)), (&ids[1], Some(&v2))];
        let mut diags = Diagnostics::new();

        check_reserved("Order", &defs, &mut diags);

        assert!(diags.is_empty());
    }
}
